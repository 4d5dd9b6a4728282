//! The shared namespace of signals referenced by rules.

use std::collections::HashMap;

use log::debug;

use crate::error::{Error, Result};
use crate::types::Var;

/// A named boolean signal.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Variable {
    pub name: String,
    /// Variable that always carries the inverse of this one.
    pub complement: Option<Var>,
    /// Variable this one was derived from, if it was created by reshuffling.
    pub source: Option<Var>,
}

/// Assigns and looks up variables by name.
///
/// Names are unique within a set. Variables are never removed, so a [`Var`]
/// handed out by the set stays valid for its whole lifetime.
#[derive(Debug, Clone, Default)]
pub struct VariableSet {
    variables: Vec<Variable>,
    names: HashMap<String, Var>,
}

impl VariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn contains(&self, var: Var) -> bool {
        var.index() < self.variables.len()
    }

    pub fn get(&self, var: Var) -> Option<&Variable> {
        self.variables.get(var.index())
    }

    /// Returns the name of a variable.
    ///
    /// # Panics
    ///
    /// Panics if `var` does not belong to this set.
    pub fn name(&self, var: Var) -> &str {
        &self.variables[var.index()].name
    }

    pub fn find(&self, name: &str) -> Option<Var> {
        self.names.get(name).copied()
    }

    pub fn complement(&self, var: Var) -> Option<Var> {
        self.get(var).and_then(|v| v.complement)
    }

    pub fn source(&self, var: Var) -> Option<Var> {
        self.get(var).and_then(|v| v.source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Var, &Variable)> + '_ {
        self.variables
            .iter()
            .enumerate()
            .map(|(i, v)| (Var::new(i as u32), v))
    }

    /// Defines a new variable, failing if the name is already taken.
    pub fn define(&mut self, name: &str) -> Result<Var> {
        if self.names.contains_key(name) {
            return Err(Error::InvalidInput(format!("variable '{}' is already defined", name)));
        }
        Ok(self.insert(name.to_string(), None))
    }

    /// Returns the variable with the given name, defining it if needed.
    pub fn get_or_define(&mut self, name: &str) -> Var {
        match self.find(name) {
            Some(var) => var,
            None => self.insert(name.to_string(), None),
        }
    }

    /// Defines a fresh variable holding the inverse of `var` and links the two.
    ///
    /// The name is `prefix` followed by the name of `var`, with a numeric
    /// suffix appended when that name is already taken.
    pub fn define_complement(&mut self, var: Var, prefix: &str) -> Result<Var> {
        let Some(variable) = self.get(var) else {
            return Err(Error::InvalidInput(format!("unknown variable {}", var)));
        };
        if let Some(existing) = variable.complement {
            return Ok(existing);
        }

        let base = format!("{}{}", prefix, variable.name);
        let mut name = base.clone();
        let mut suffix = 0;
        while self.names.contains_key(&name) {
            suffix += 1;
            name = format!("{}_{}", base, suffix);
        }

        let complement = self.insert(name, Some(var));
        self.variables[var.index()].complement = Some(complement);
        self.variables[complement.index()].complement = Some(var);
        debug!("defined complement {} of {}", self.name(complement), self.name(var));
        Ok(complement)
    }

    fn insert(&mut self, name: String, source: Option<Var>) -> Var {
        let var = Var::new(self.variables.len() as u32);
        self.names.insert(name.clone(), var);
        self.variables.push(Variable {
            name,
            complement: None,
            source,
        });
        var
    }
}
