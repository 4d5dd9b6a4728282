//! Guard expressions with per-node bubbles.
//!
//! A guard is a tree of literals combined with AND/OR. Every node carries a
//! *bubble*: a flag marking that the node's output is inverted relative to
//! its un-bubbled meaning. The value of a node is `raw ^ bubble`, where `raw`
//! is `var ^ negated` for a literal and the AND/OR of the children's values
//! for a combinator.
//!
//! The central rewrite is the [De Morgan flip][Expr::de_morgan]: toggle the
//! node's bubble, swap AND and OR, toggle the bubble of every child. For a
//! literal the flip toggles bubble and polarity together. Either way the
//! function computed by the node is unchanged.
//!
//! # Examples
//!
//! ```
//! use bubble_rs::expr::Expr;
//! use bubble_rs::types::Var;
//!
//! let a = Var::new(0);
//! let b = Var::new(1);
//! let mut f = Expr::and(vec![Expr::var(a), Expr::var(b)]).unwrap().not();
//! let before = |x: bool, y: bool| f.eval(&|v| if v == a { x } else { y });
//! let table: Vec<bool> = [(false, false), (false, true), (true, false), (true, true)]
//!     .iter()
//!     .map(|&(x, y)| before(x, y))
//!     .collect();
//!
//! f.de_morgan();
//! assert!(!f.bubble());
//! assert!(f.is_or());
//! for (i, &(x, y)) in [(false, false), (false, true), (true, false), (true, true)].iter().enumerate() {
//!     assert_eq!(f.eval(&|v| if v == a { x } else { y }), table[i]);
//! }
//! ```

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::types::Var;
use crate::variable::VariableSet;

/// A reference to a variable with a polarity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Literal {
    pub var: Var,
    pub negated: bool,
}

impl Literal {
    pub const fn new(var: Var, negated: bool) -> Self {
        Self { var, negated }
    }

    pub fn eval(&self, value: bool) -> bool {
        value ^ self.negated
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Expr {
    kind: ExprKind,
    bubble: bool,
}

// Constructors
impl Expr {
    pub fn literal(var: Var, negated: bool) -> Self {
        Self {
            kind: ExprKind::Literal(Literal::new(var, negated)),
            bubble: false,
        }
    }

    pub fn var(var: Var) -> Self {
        Self::literal(var, false)
    }

    pub fn not_var(var: Var) -> Self {
        Self::literal(var, true)
    }

    pub fn and(children: Vec<Expr>) -> Result<Self> {
        if children.is_empty() {
            return Err(Error::InvalidInput("AND with no operands".to_string()));
        }
        Ok(Self {
            kind: ExprKind::And(children),
            bubble: false,
        })
    }

    pub fn or(children: Vec<Expr>) -> Result<Self> {
        if children.is_empty() {
            return Err(Error::InvalidInput("OR with no operands".to_string()));
        }
        Ok(Self {
            kind: ExprKind::Or(children),
            bubble: false,
        })
    }

    /// Inverts the expression by toggling the bubble on its root.
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        self.bubble = !self.bubble;
        self
    }

    /// Builds an expression from raw parts without checking arity.
    pub(crate) fn from_parts(kind: ExprKind, bubble: bool) -> Self {
        Self { kind, bubble }
    }
}

// Getters
impl Expr {
    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn bubble(&self) -> bool {
        self.bubble
    }

    pub fn set_bubble(&mut self, bubble: bool) {
        self.bubble = bubble;
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(_))
    }

    pub fn is_and(&self) -> bool {
        matches!(self.kind, ExprKind::And(_))
    }

    pub fn is_or(&self) -> bool {
        matches!(self.kind, ExprKind::Or(_))
    }

    pub fn as_literal(&self) -> Option<Literal> {
        match self.kind {
            ExprKind::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Expr] {
        match &self.kind {
            ExprKind::Literal(_) => &[],
            ExprKind::And(children) | ExprKind::Or(children) => children,
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(Expr::size).sum::<usize>()
    }

    /// Depth of the tree (0 for a literal).
    pub fn depth(&self) -> usize {
        match &self.kind {
            ExprKind::Literal(_) => 0,
            ExprKind::And(children) | ExprKind::Or(children) => {
                1 + children.iter().map(Expr::depth).max().unwrap_or(0)
            }
        }
    }

    /// All variables referenced by the tree.
    pub fn variables(&self) -> BTreeSet<Var> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut BTreeSet<Var>) {
        match &self.kind {
            ExprKind::Literal(lit) => {
                vars.insert(lit.var);
            }
            ExprKind::And(children) | ExprKind::Or(children) => {
                for child in children {
                    child.collect_variables(vars);
                }
            }
        }
    }
}

// Semantics
impl Expr {
    /// Evaluates the node, bubble included.
    pub fn eval(&self, assignment: &impl Fn(Var) -> bool) -> bool {
        self.eval_raw(assignment) ^ self.bubble
    }

    /// Evaluates the canonical meaning of the node, ignoring its own bubble.
    ///
    /// Bubbles below the node still apply, since they are part of what the
    /// node's operands compute.
    pub fn eval_raw(&self, assignment: &impl Fn(Var) -> bool) -> bool {
        match &self.kind {
            ExprKind::Literal(lit) => lit.eval(assignment(lit.var)),
            ExprKind::And(children) => children.iter().all(|c| c.eval(assignment)),
            ExprKind::Or(children) => children.iter().any(|c| c.eval(assignment)),
        }
    }

    /// Applies the De Morgan flip to this node.
    ///
    /// Toggles the bubble, swaps AND/OR and toggles the bubble of every
    /// immediate child. On a literal, toggles the bubble and the polarity.
    pub fn de_morgan(&mut self) {
        self.bubble = !self.bubble;
        let kind = std::mem::replace(&mut self.kind, ExprKind::And(Vec::new()));
        self.kind = match kind {
            ExprKind::Literal(lit) => ExprKind::Literal(Literal::new(lit.var, !lit.negated)),
            ExprKind::And(children) => ExprKind::Or(toggle_all(children)),
            ExprKind::Or(children) => ExprKind::And(toggle_all(children)),
        };
    }
}

fn toggle_all(mut children: Vec<Expr>) -> Vec<Expr> {
    for child in children.iter_mut() {
        child.bubble = !child.bubble;
    }
    children
}

// Formatting
impl Expr {
    /// Returns a value that formats the expression in PRS syntax.
    pub fn display<'a>(&'a self, vars: &'a VariableSet) -> ExprDisplay<'a> {
        ExprDisplay { expr: self, vars }
    }
}

pub struct ExprDisplay<'a> {
    expr: &'a Expr,
    vars: &'a VariableSet,
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self.expr, self.vars, None)
    }
}

fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, vars: &VariableSet, parent: Option<&ExprKind>) -> fmt::Result {
    if expr.bubble {
        write!(f, "~(")?;
        write_body(f, expr, vars)?;
        return write!(f, ")");
    }

    // A nested combinator keeps its parentheses, except for AND under OR.
    let parenthesize = match (parent, &expr.kind) {
        (_, ExprKind::Literal(_)) | (None, _) => false,
        (Some(ExprKind::Or(_)), ExprKind::And(_)) => false,
        _ => true,
    };
    if parenthesize {
        write!(f, "(")?;
        write_body(f, expr, vars)?;
        write!(f, ")")
    } else {
        write_body(f, expr, vars)
    }
}

fn write_body(f: &mut fmt::Formatter<'_>, expr: &Expr, vars: &VariableSet) -> fmt::Result {
    let (children, sep) = match &expr.kind {
        ExprKind::Literal(lit) => {
            let name = vars.get(lit.var).map_or("?", |v| v.name.as_str());
            return write!(f, "{}{}", if lit.negated { "~" } else { "" }, name);
        }
        ExprKind::And(children) => (children, "&"),
        ExprKind::Or(children) => (children, "|"),
    };
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write_expr(f, child, vars, Some(&expr.kind))?;
    }
    Ok(())
}
