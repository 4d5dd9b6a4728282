//! Production rules and rule sets.

use std::fmt;

use crate::error::{Error, Result};
use crate::expr::{Expr, ExprKind};
use crate::types::{Direction, Var};
use crate::variable::VariableSet;

/// A guarded transition: when `guard` holds, drive `target` in `direction`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Rule {
    pub guard: Expr,
    pub target: Var,
    pub direction: Direction,
}

impl Rule {
    pub fn new(guard: Expr, target: Var, direction: Direction) -> Self {
        Self {
            guard,
            target,
            direction,
        }
    }

    pub fn rise(guard: Expr, target: Var) -> Self {
        Self::new(guard, target, Direction::Rise)
    }

    pub fn fall(guard: Expr, target: Var) -> Self {
        Self::new(guard, target, Direction::Fall)
    }
}

/// An ordered collection of rules.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    /// Rules that drive `var`, in rule order.
    pub fn drivers(&self, var: Var) -> impl Iterator<Item = &Rule> + '_ {
        self.rules.iter().filter(move |r| r.target == var)
    }

    /// Checks that every guard and target refers to a variable of `vars`
    /// and that no combinator is empty.
    pub fn validate(&self, vars: &VariableSet) -> Result<()> {
        for (i, rule) in self.rules.iter().enumerate() {
            if !vars.contains(rule.target) {
                return Err(Error::InvalidInput(format!(
                    "rule {} targets unknown variable {}",
                    i, rule.target
                )));
            }
            validate_expr(&rule.guard, vars, i)?;
        }
        Ok(())
    }

    /// Returns a value that formats the rule set in PRS syntax, one rule per line.
    pub fn display<'a>(&'a self, vars: &'a VariableSet) -> RuleSetDisplay<'a> {
        RuleSetDisplay { rules: self, vars }
    }
}

fn validate_expr(expr: &Expr, vars: &VariableSet, rule: usize) -> Result<()> {
    match expr.kind() {
        ExprKind::Literal(lit) => {
            if !vars.contains(lit.var) {
                return Err(Error::InvalidInput(format!(
                    "rule {} reads unknown variable {}",
                    rule, lit.var
                )));
            }
        }
        ExprKind::And(children) | ExprKind::Or(children) => {
            if children.is_empty() {
                return Err(Error::InvalidInput(format!("rule {} has an empty combinator", rule)));
            }
            for child in children {
                validate_expr(child, vars, rule)?;
            }
        }
    }
    Ok(())
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

impl Extend<Rule> for RuleSet {
    fn extend<I: IntoIterator<Item = Rule>>(&mut self, iter: I) {
        self.rules.extend(iter);
    }
}

impl IntoIterator for RuleSet {
    type Item = Rule;
    type IntoIter = std::vec::IntoIter<Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.into_iter()
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

pub struct RuleSetDisplay<'a> {
    rules: &'a RuleSet,
    vars: &'a VariableSet,
}

impl fmt::Display for RuleSetDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in self.rules {
            let target = self.vars.get(rule.target).map_or("?", |v| v.name.as_str());
            writeln!(f, "{} -> {}{}", rule.guard.display(self.vars), target, rule.direction)?;
        }
        Ok(())
    }
}
