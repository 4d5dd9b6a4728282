//! Type-safe handles for variables, terms and transition directions.
//!
//! These newtypes keep variable indices and term indices apart at compile
//! time, so a term handle can never be used to look up a variable.
use std::fmt;

/// A variable identifier (0-indexed position in a [`VariableSet`][crate::variable::VariableSet]).
///
/// # Invariants
///
/// - Identifiers are handed out by the variable set and never reused.
/// - A `Var` is only meaningful together with the set that created it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Creates a variable handle from a raw index.
    pub const fn new(index: u32) -> Self {
        Var(index)
    }

    /// Returns the raw index as a `usize`.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<Var> for u32 {
    fn from(var: Var) -> Self {
        var.0
    }
}

/// A stable handle of one term inside a [`Network`][crate::net::Network].
///
/// Handles are allocated in increasing order and never invalidated: the
/// network only ever appends terms. This is what lets a driver walk the
/// network with a cursor while the network grows underneath it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TermId(u32);

impl TermId {
    /// Creates a term handle from a raw index.
    pub const fn new(index: u32) -> Self {
        TermId(index)
    }

    /// Returns the raw index as a `usize`.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the handle right after this one.
    pub const fn next(self) -> Self {
        TermId(self.0 + 1)
    }

    /// Returns the handle right before this one, or `None` for the first.
    pub fn prev(self) -> Option<Self> {
        if self.0 > 0 {
            Some(TermId(self.0 - 1))
        } else {
            None
        }
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl From<usize> for TermId {
    fn from(index: usize) -> Self {
        TermId(index as u32)
    }
}

/// Direction of a signal transition driven by a rule.
///
/// A rising rule is realized by a pull-up network, a falling rule by a
/// pull-down network.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Direction {
    Rise,
    Fall,
}

impl Direction {
    /// Returns `true` for [`Direction::Rise`].
    pub const fn is_rise(self) -> bool {
        matches!(self, Direction::Rise)
    }

    /// Returns the opposite direction.
    pub const fn flip(self) -> Self {
        match self {
            Direction::Rise => Direction::Fall,
            Direction::Fall => Direction::Rise,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Rise => write!(f, "+"),
            Direction::Fall => write!(f, "-"),
        }
    }
}
