//! The term network: an arena view over a rule set.
//!
//! Every position inside a guard becomes a [`Term`] addressed by a stable
//! [`TermId`]. Terms are allocated rule by rule, each guard in pre-order, so
//! a parent always has a smaller id than its children and the iteration
//! order is reproducible. Besides the structural parent/child edges, the
//! network keeps for every variable the list of literal terms that read it
//! (fan-out) and the list of rules that drive it (fan-in).
//!
//! The network only ever grows: duplication and inverter insertion append
//! new rules and terms, rewiring retargets a literal in place. No id handed
//! out is ever invalidated.
//!
//! # Senses
//!
//! The *sense* of a literal is its effective negation, counting every
//! bubble on the path to the root, relative to the direction of its rule. A
//! pull-down (falling) network consumes `x` in sense `false`, a pull-up
//! (rising) network consumes `~x` in sense `false`. Two literals reading the
//! same variable in different senses cannot share one wire; such a variable
//! is *conflicted*. The sense is invariant under De Morgan flips.

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::expr::{Expr, ExprKind, Literal};
use crate::rule::{Rule, RuleSet};
use crate::types::{Direction, TermId, Var};
use crate::variable::VariableSet;

/// Default prefix of complement variable names.
pub const COMPLEMENT_PREFIX: &str = "_";

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TermKind {
    Literal(Literal),
    And(Vec<TermId>),
    Or(Vec<TermId>),
}

/// One node of a guard inside the network.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Term {
    pub kind: TermKind,
    pub bubble: bool,
    pub parent: Option<TermId>,
    /// Index of the rule owning this term.
    pub rule: usize,
}

impl Term {
    pub fn as_literal(&self) -> Option<Literal> {
        match self.kind {
            TermKind::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn children(&self) -> &[TermId] {
        match &self.kind {
            TermKind::Literal(_) => &[],
            TermKind::And(children) | TermKind::Or(children) => children,
        }
    }
}

/// How a rule of the network came to be.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Origin {
    /// Imported from the source rule set.
    Imported,
    /// Half of an inverter inserted to hold a bubble.
    Inverter,
    /// Complemented clone of the given rule.
    Duplicate(usize),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NetRule {
    pub root: TermId,
    pub target: Var,
    pub direction: Direction,
    pub origin: Origin,
}

#[derive(Debug, Clone)]
pub struct Network {
    vars: VariableSet,
    rules: Vec<NetRule>,
    terms: Vec<Term>,
    /// Literal terms reading each variable.
    readers: Vec<Vec<TermId>>,
    /// Rules driving each variable.
    drivers: Vec<Vec<usize>>,
    /// Sense shared by all readers of a complement pair.
    kept: Vec<Option<bool>>,
    complement_prefix: String,
}

impl Network {
    /// Builds the network over `rules`.
    ///
    /// Fails with [`Error::InvalidInput`] if a rule refers to a variable
    /// missing from `vars` or contains an empty combinator. Nothing is built
    /// in that case.
    pub fn build(rules: &RuleSet, vars: &VariableSet) -> Result<Self> {
        Self::build_with_prefix(rules, vars, COMPLEMENT_PREFIX)
    }

    /// Same as [`Network::build`], naming complement variables with `prefix`.
    pub fn build_with_prefix(rules: &RuleSet, vars: &VariableSet, prefix: &str) -> Result<Self> {
        rules.validate(vars)?;

        let mut net = Self {
            vars: vars.clone(),
            rules: Vec::with_capacity(rules.len()),
            terms: Vec::new(),
            readers: Vec::new(),
            drivers: Vec::new(),
            kept: Vec::new(),
            complement_prefix: prefix.to_string(),
        };
        net.sync_vars();

        for rule in rules {
            net.add_rule(&rule.guard, rule.target, rule.direction, Origin::Imported);
        }

        // Pairs carried over from an earlier run keep the sense most of their readers agree on.
        for var in (0..net.vars.len()).map(|i| Var::new(i as u32)) {
            if let Some(other) = net.vars.complement(var) {
                if var < other && net.kept[var.index()].is_none() {
                    if let Some(sense) = net.pair_majority(var) {
                        net.set_kept_sense(var, sense);
                    }
                }
            }
        }

        debug!(
            "built network: {} rules, {} terms, {} variables",
            net.rules.len(),
            net.terms.len(),
            net.vars.len()
        );
        Ok(net)
    }

    fn sync_vars(&mut self) {
        let n = self.vars.len();
        self.readers.resize_with(n, Vec::new);
        self.drivers.resize_with(n, Vec::new);
        self.kept.resize(n, None);
    }

    fn add_rule(&mut self, guard: &Expr, target: Var, direction: Direction, origin: Origin) -> usize {
        let index = self.rules.len();
        let root = self.alloc_expr(guard, None, index);
        self.rules.push(NetRule {
            root,
            target,
            direction,
            origin,
        });
        self.drivers[target.index()].push(index);
        trace!("rule {}: root {} drives {}{}", index, root, target, direction);
        index
    }

    /// Allocates `expr` in pre-order below `parent`.
    fn alloc_expr(&mut self, expr: &Expr, parent: Option<TermId>, rule: usize) -> TermId {
        let id = TermId::from(self.terms.len());
        let kind = match expr.kind() {
            ExprKind::Literal(lit) => {
                self.readers[lit.var.index()].push(id);
                TermKind::Literal(*lit)
            }
            ExprKind::And(_) => TermKind::And(Vec::new()),
            ExprKind::Or(_) => TermKind::Or(Vec::new()),
        };
        self.terms.push(Term {
            kind,
            bubble: expr.bubble(),
            parent,
            rule,
        });

        let children: Vec<TermId> = expr
            .children()
            .iter()
            .map(|child| self.alloc_expr(child, Some(id), rule))
            .collect();
        match &mut self.terms[id.index()].kind {
            TermKind::And(slots) | TermKind::Or(slots) => *slots = children,
            TermKind::Literal(_) => {}
        }
        id
    }

    /// Clones the subtree at `id` in pre-order, attaching it to `parent` in `rule`.
    fn clone_subtree(&mut self, id: TermId, parent: Option<TermId>, rule: usize) -> TermId {
        let source = self.terms[id.index()].clone();
        let copy = TermId::from(self.terms.len());
        let kind = match &source.kind {
            TermKind::Literal(lit) => {
                self.readers[lit.var.index()].push(copy);
                TermKind::Literal(*lit)
            }
            TermKind::And(_) => TermKind::And(Vec::new()),
            TermKind::Or(_) => TermKind::Or(Vec::new()),
        };
        self.terms.push(Term {
            kind,
            bubble: source.bubble,
            parent,
            rule,
        });

        let children: Vec<TermId> = source
            .children()
            .iter()
            .map(|&child| self.clone_subtree(child, Some(copy), rule))
            .collect();
        match &mut self.terms[copy.index()].kind {
            TermKind::And(slots) | TermKind::Or(slots) => *slots = children,
            TermKind::Literal(_) => {}
        }
        copy
    }
}

// Getters
//
// Lookups by `TermId` or `Var` panic on a handle that does not belong to
// this network.
impl Network {
    /// Number of terms. Also the id one past the last term.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = TermId> {
        (0..self.terms.len()).map(TermId::from)
    }

    /// # Panics
    ///
    /// Panics if `id` is not a term of this network.
    pub fn term(&self, id: TermId) -> &Term {
        &self.terms[id.index()]
    }

    pub fn parent(&self, id: TermId) -> Option<TermId> {
        self.term(id).parent
    }

    pub fn children(&self, id: TermId) -> &[TermId] {
        self.term(id).children()
    }

    pub fn rules(&self) -> &[NetRule] {
        &self.rules
    }

    pub fn rule_of(&self, id: TermId) -> &NetRule {
        &self.rules[self.term(id).rule]
    }

    pub fn is_root(&self, id: TermId) -> bool {
        self.term(id).parent.is_none()
    }

    pub fn variables(&self) -> &VariableSet {
        &self.vars
    }

    /// Literal terms reading `var`, in term order.
    ///
    /// # Panics
    ///
    /// Panics if `var` is not a variable of this network.
    pub fn readers(&self, var: Var) -> &[TermId] {
        &self.readers[var.index()]
    }

    /// Indices of the rules driving `var`.
    ///
    /// # Panics
    ///
    /// Panics if `var` is not a variable of this network.
    pub fn drivers(&self, var: Var) -> &[usize] {
        &self.drivers[var.index()]
    }

    pub fn kept_sense(&self, var: Var) -> Option<bool> {
        self.kept[var.index()]
    }

    /// Number of terms in the guards driving `var`, i.e. the size of its duplicate.
    pub fn driver_size(&self, var: Var) -> usize {
        self.drivers(var)
            .iter()
            .map(|&r| self.subtree_size(self.rules[r].root))
            .sum()
    }

    pub fn subtree_size(&self, id: TermId) -> usize {
        1 + self
            .children(id)
            .iter()
            .map(|&c| self.subtree_size(c))
            .sum::<usize>()
    }
}

// Senses and conflicts
impl Network {
    /// Parity of all bubbles from `id` up to its root, both included.
    pub fn parity(&self, id: TermId) -> bool {
        let mut parity = false;
        let mut cur = Some(id);
        while let Some(t) = cur {
            let term = self.term(t);
            parity ^= term.bubble;
            cur = term.parent;
        }
        parity
    }

    /// Sense in which a literal consumes its variable, `None` for combinators.
    pub fn sense(&self, id: TermId) -> Option<bool> {
        let lit = self.term(id).as_literal()?;
        let direction = self.rule_of(id).direction;
        Some(lit.negated ^ self.parity(id) ^ direction.is_rise())
    }

    /// Sense most readers of `var` agree on. Ties go to the first reader.
    pub fn majority_sense(&self, var: Var) -> Option<bool> {
        majority(self.readers(var).iter().map(|&r| self.sense_of_reader(r)))
    }

    /// Sense most readers of `var` and of its complement agree on.
    pub fn pair_majority(&self, var: Var) -> Option<bool> {
        let mut readers: Vec<TermId> = self.readers(var).to_vec();
        if let Some(other) = self.vars.complement(var) {
            readers.extend_from_slice(self.readers(other));
        }
        readers.sort();
        majority(readers.into_iter().map(|r| self.sense_of_reader(r)))
    }

    fn sense_of_reader(&self, id: TermId) -> bool {
        self.sense(id).unwrap_or(false)
    }

    /// Whether the readers of `var` disagree on the sense they consume.
    ///
    /// For a variable with a complement, every reader must consume the sense
    /// kept by the pair.
    pub fn is_conflicted(&self, var: Var) -> bool {
        let mut senses = self.readers(var).iter().map(|&r| self.sense_of_reader(r));
        match self.kept_sense(var) {
            Some(kept) => senses.any(|s| s != kept),
            None => match senses.next() {
                Some(first) => senses.any(|s| s != first),
                None => false,
            },
        }
    }

    /// All conflicted variables, in variable order.
    pub fn conflicts(&self) -> Vec<Var> {
        self.vars
            .iter()
            .map(|(var, _)| var)
            .filter(|&var| self.is_conflicted(var))
            .collect()
    }

    /// Whether every guard is free of bubbles and no variable is conflicted.
    pub fn is_implementable(&self) -> bool {
        self.terms.iter().all(|t| !t.bubble) && self.conflicts().is_empty()
    }

    /// Termination measure of reshuffling, compared lexicographically.
    ///
    /// The first component counts variables without a complement, the
    /// second counts readers on the wrong side of a conflict.
    pub fn measure(&self) -> (usize, usize) {
        let mut without_complement = 0;
        let mut misplaced = 0;
        for (var, variable) in self.vars.iter() {
            if variable.complement.is_none() {
                without_complement += 1;
            }
            let senses = self.readers(var).iter().map(|&r| self.sense_of_reader(r));
            misplaced += match self.kept_sense(var) {
                Some(kept) => senses.filter(|&s| s != kept).count(),
                None => {
                    let (plain, inverted) = senses.fold((0, 0), |(p, i), s| if s { (p, i + 1) } else { (p + 1, i) });
                    plain.min(inverted)
                }
            };
        }
        (without_complement, misplaced)
    }
}

fn majority(senses: impl Iterator<Item = bool>) -> Option<bool> {
    let mut first = None;
    let mut balance: i64 = 0;
    for sense in senses {
        first.get_or_insert(sense);
        balance += if sense { 1 } else { -1 };
    }
    let first = first?;
    Some(match balance {
        0 => first,
        b => b > 0,
    })
}

// Rewrites
impl Network {
    /// Applies the De Morgan flip to one term.
    ///
    /// On a combinator: toggles its bubble, swaps AND/OR and toggles every
    /// child's bubble. On a literal: toggles its bubble and polarity.
    pub fn flip(&mut self, id: TermId) {
        let term = &mut self.terms[id.index()];
        term.bubble = !term.bubble;
        let (kind, children) = match std::mem::replace(&mut term.kind, TermKind::And(Vec::new())) {
            TermKind::Literal(lit) => (TermKind::Literal(Literal::new(lit.var, !lit.negated)), Vec::new()),
            TermKind::And(children) => (TermKind::Or(children.clone()), children),
            TermKind::Or(children) => (TermKind::And(children.clone()), children),
        };
        term.kind = kind;
        for child in children {
            let child = &mut self.terms[child.index()];
            child.bubble = !child.bubble;
        }
        trace!("flipped {}", id);
    }

    /// Retargets the literal `id` to `to`, which must be the complement of
    /// the variable it reads. The polarity is toggled so the literal keeps
    /// computing the same function.
    pub fn rewire(&mut self, id: TermId, to: Var) -> Result<()> {
        if id.index() >= self.terms.len() {
            return Err(Error::InvalidInput(format!("{} is out of range", id)));
        }
        let Some(lit) = self.term(id).as_literal() else {
            return Err(Error::InvalidInput(format!("{} is not a literal", id)));
        };
        if self.vars.complement(lit.var) != Some(to) {
            return Err(Error::InvalidInput(format!(
                "{} is not the complement of {}",
                self.vars.get(to).map_or("?", |v| v.name.as_str()),
                self.vars.name(lit.var)
            )));
        }

        self.readers[lit.var.index()].retain(|&r| r != id);
        let readers = &mut self.readers[to.index()];
        let at = readers.partition_point(|&r| r < id);
        readers.insert(at, id);
        self.terms[id.index()].kind = TermKind::Literal(Literal::new(to, !lit.negated));
        debug!("rewired {} from {} to {}", id, self.vars.name(lit.var), self.vars.name(to));
        Ok(())
    }

    /// Records the sense shared by all readers of `var` and its complement.
    pub fn set_kept_sense(&mut self, var: Var, sense: bool) {
        self.kept[var.index()] = Some(sense);
        if let Some(other) = self.vars.complement(var) {
            self.kept[other.index()] = Some(sense);
        }
    }

    fn new_complement(&mut self, var: Var) -> Result<Var> {
        if !self.vars.contains(var) {
            return Err(Error::InvalidInput(format!("unknown variable {}", var)));
        }
        if self.vars.complement(var).is_some() {
            return Err(Error::InvalidInput(format!(
                "{} already has a complement",
                self.vars.name(var)
            )));
        }
        let complement = self.vars.define_complement(var, &self.complement_prefix)?;
        self.sync_vars();
        Ok(complement)
    }

    /// Creates the complement of `var` as a pass-through inverter:
    /// `var -> _var-` and `~var -> _var+`.
    pub fn insert_inverter(&mut self, var: Var) -> Result<Var> {
        let complement = self.new_complement(var)?;
        self.add_rule(&Expr::var(var), complement, Direction::Fall, Origin::Inverter);
        self.add_rule(&Expr::not_var(var), complement, Direction::Rise, Origin::Inverter);
        debug!("inserted inverter {} -> {}", self.vars.name(var), self.vars.name(complement));
        Ok(complement)
    }

    /// Creates the complement of `var` by cloning every rule driving it with
    /// the direction swapped.
    ///
    /// Fails with [`Error::InvalidInput`] if `var` has no driving rule.
    pub fn duplicate(&mut self, var: Var) -> Result<Var> {
        let sources = self.drivers(var).to_vec();
        if sources.is_empty() {
            return Err(Error::InvalidInput(format!(
                "cannot duplicate undriven variable {}",
                self.vars.name(var)
            )));
        }

        let complement = self.new_complement(var)?;
        for source in sources {
            let NetRule { root, direction, .. } = self.rules[source].clone();
            let index = self.rules.len();
            let copy = self.clone_subtree(root, None, index);
            self.rules.push(NetRule {
                root: copy,
                target: complement,
                direction: direction.flip(),
                origin: Origin::Duplicate(source),
            });
            self.drivers[complement.index()].push(index);
        }
        debug!(
            "duplicated drivers of {} into {}",
            self.vars.name(var),
            self.vars.name(complement)
        );
        Ok(complement)
    }
}

// Flattening
impl Network {
    /// Rebuilds the guard rooted at `id` as an expression tree.
    pub fn to_expr(&self, id: TermId) -> Expr {
        let term = self.term(id);
        let kind = match &term.kind {
            TermKind::Literal(lit) => ExprKind::Literal(*lit),
            TermKind::And(children) => ExprKind::And(children.iter().map(|&c| self.to_expr(c)).collect()),
            TermKind::Or(children) => ExprKind::Or(children.iter().map(|&c| self.to_expr(c)).collect()),
        };
        Expr::from_parts(kind, term.bubble)
    }

    /// Flattens the network into a rule set: the imported rules first, in
    /// their original order, then every rule added by reshuffling.
    pub fn to_rule_set(&self) -> RuleSet {
        self.rules
            .iter()
            .map(|r| Rule::new(self.to_expr(r.root), r.target, r.direction))
            .collect()
    }
}
