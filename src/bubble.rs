//! Bubble reshuffling.
//!
//! The reshuffler walks the [term network][crate::net::Network] one term at
//! a time and rewrites it until every guard is implementable with inverting
//! gates:
//!
//! 1. Every guard root must present an un-bubbled output to its rule.
//! 2. A bubbled combinator is De Morgan flipped, pushing the inversion onto
//!    its children. A bubbled literal absorbs the bubble into its polarity.
//!    Terms are visited parents first, so one sweep clears a whole guard.
//! 3. A literal whose variable is read in both senses is a fan-out
//!    conflict. The variable gets a complement, either through an inserted
//!    inverter or by duplicating the rules that drive it, and the literals on
//!    the moving side are rewired to the complement.
//! 4. Sweeps repeat until nothing changes. Every sweep after the first must
//!    strictly decrease [`Network::measure`], otherwise the run is aborted
//!    as [`Error::Unresolvable`].
//!
//! [`Bubble::step`] performs the work of exactly one term, so a driver can
//! iterate the network itself and take a snapshot after every change;
//! [`Bubble::reshuffle`] drives the same primitive to the fixpoint.
//!
//! # Examples
//!
//! ```
//! use bubble_rs::bubble::Bubble;
//! use bubble_rs::parse::parse_prs;
//! use bubble_rs::variable::VariableSet;
//!
//! let mut vars = VariableSet::new();
//! let mut rules = parse_prs("x & p -> y+\n~x & q -> z+", &mut vars).unwrap();
//!
//! let mut bub = Bubble::load(&rules, &vars).unwrap();
//! let mut cursor = bub.begin();
//! while cursor != bub.end() {
//!     let (_counter, _changed) = bub.step(cursor).unwrap();
//!     cursor = cursor.next();
//! }
//! assert!(bub.net().is_implementable());
//!
//! bub.save(&mut rules, &mut vars).unwrap();
//! assert!(vars.find("_x").is_some());
//! ```

use log::{debug, info};

use crate::config::{Config, Strategy};
use crate::error::{Error, Result};
use crate::net::Network;
use crate::rule::RuleSet;
use crate::types::{TermId, Var};
use crate::variable::VariableSet;

/// How a complement is materialized.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Resolution {
    Buffer,
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct Bubble {
    net: Network,
    config: Config,
    /// Rewrites performed so far.
    counter: usize,
    /// Terms created by duplication so far.
    duplicated: usize,
    failure: Option<Error>,
}

impl Bubble {
    /// Builds the network over an imported rule set with the default configuration.
    pub fn load(rules: &RuleSet, vars: &VariableSet) -> Result<Self> {
        Self::load_with_config(rules, vars, Config::default())
    }

    pub fn load_with_config(rules: &RuleSet, vars: &VariableSet, config: Config) -> Result<Self> {
        let net = Network::build_with_prefix(rules, vars, &config.complement_prefix)?;
        Ok(Self {
            net,
            config,
            counter: 0,
            duplicated: 0,
            failure: None,
        })
    }

    /// Flattens the network back into `rules` and `vars`.
    ///
    /// Every guard is replaced by its rewritten tree, rules created by
    /// reshuffling are appended, and `vars` receives the complement
    /// variables. Refuses with the original error after a failed run.
    pub fn save(&self, rules: &mut RuleSet, vars: &mut VariableSet) -> Result<()> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        *rules = self.net.to_rule_set();
        *vars = self.net.variables().clone();
        Ok(())
    }

    pub fn net(&self) -> &Network {
        &self.net
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Rewrites performed so far.
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// First term of the network.
    pub fn begin(&self) -> TermId {
        TermId::new(0)
    }

    /// One past the last term. Grows when a step appends terms.
    pub fn end(&self) -> TermId {
        TermId::from(self.net.len())
    }
}

impl Bubble {
    /// Performs the work associated with the term `id`.
    ///
    /// Returns the global rewrite counter and whether the step changed the
    /// network.
    pub fn step(&mut self, id: TermId) -> Result<(usize, bool)> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if id >= self.end() {
            return Err(Error::InvalidInput(format!("{} is out of range", id)));
        }

        match self.step_term(id) {
            Ok(changed) => Ok((self.counter, changed)),
            Err(err) => {
                self.failure = Some(err.clone());
                Err(err)
            }
        }
    }

    fn step_term(&mut self, id: TermId) -> Result<bool> {
        let mut changed = false;

        if self.net.term(id).bubble {
            self.net.flip(id);
            self.counter += 1;
            changed = true;
        }

        if let Some(lit) = self.net.term(id).as_literal() {
            changed |= self.resolve(id, lit.var)?;
        }
        Ok(changed)
    }

    /// Resolves the fan-out of `var` as seen from its reader `id`.
    fn resolve(&mut self, id: TermId, var: Var) -> Result<bool> {
        let mut changed = false;

        let kept = match self.net.kept_sense(var) {
            Some(kept) => kept,
            None if self.net.variables().complement(var).is_some() => {
                let kept = self.net.pair_majority(var).unwrap_or(false);
                self.net.set_kept_sense(var, kept);
                kept
            }
            None => {
                if !self.net.is_conflicted(var) {
                    return Ok(false);
                }
                let kept = self.create_complement(var)?;
                self.counter += 1;
                changed = true;
                kept
            }
        };

        let sense = self.net.sense(id).unwrap_or(kept);
        if sense != kept {
            let Some(complement) = self.net.variables().complement(var) else {
                return Err(Error::InvalidInput(format!(
                    "{} has a kept sense but no complement",
                    self.net.variables().name(var)
                )));
            };
            self.net.rewire(id, complement)?;
            self.counter += 1;
            changed = true;
        }
        Ok(changed)
    }

    /// Materializes the complement of a conflicted variable and returns the
    /// sense its readers keep.
    fn create_complement(&mut self, var: Var) -> Result<bool> {
        let name = self.net.variables().name(var).to_string();
        let inverted = self
            .net
            .readers(var)
            .iter()
            .filter(|&&r| self.net.sense(r) == Some(true))
            .count();
        let driven = !self.net.drivers(var).is_empty();
        let cost = self.net.driver_size(var);
        let remaining = self.config.duplication_budget.saturating_sub(self.duplicated);

        let resolution = match self.config.strategy {
            Strategy::Buffer => Resolution::Buffer,
            _ if !driven => Resolution::Buffer,
            Strategy::Duplicate if cost > remaining => {
                return Err(Error::Unresolvable {
                    var: name,
                    reason: format!(
                        "duplicating {} terms exceeds the remaining budget of {}",
                        cost, remaining
                    ),
                });
            }
            Strategy::Duplicate => Resolution::Duplicate,
            Strategy::Auto if inverted <= 1 => Resolution::Buffer,
            Strategy::Auto if cost > remaining => {
                debug!("duplication budget exhausted for {}, buffering", name);
                Resolution::Buffer
            }
            Strategy::Auto => Resolution::Duplicate,
        };

        let kept = match resolution {
            Resolution::Buffer => {
                // The inverter itself consumes the plain sense.
                self.net.insert_inverter(var)?;
                false
            }
            Resolution::Duplicate => {
                let kept = self.net.majority_sense(var).unwrap_or(false);
                self.net.duplicate(var)?;
                self.duplicated += cost;
                kept
            }
        };
        self.net.set_kept_sense(var, kept);
        debug!("resolved fan-out of {} by {:?}, keeping sense {}", name, resolution, kept);
        Ok(kept)
    }
}

impl Bubble {
    /// Runs the reshuffling to its fixpoint and returns the rewrite counter.
    pub fn reshuffle(&mut self) -> Result<usize> {
        self.reshuffle_observed(|_, _| {})
    }

    /// Same as [`Bubble::reshuffle`], calling `observer` with a snapshot
    /// index and the network right after every step that changed it.
    ///
    /// The measure check after each pass is a guard only: every complement
    /// is created in the first pass and later passes only rewire, which
    /// always lowers the measure. In practice [`Error::Unresolvable`] comes
    /// from an exhausted duplication budget.
    pub fn reshuffle_observed<F>(&mut self, mut observer: F) -> Result<usize>
    where
        F: FnMut(usize, &Network),
    {
        let mut snapshot = 0;
        let mut previous = self.net.measure();
        let mut pass = 0;

        loop {
            let mut changed_any = false;
            let mut cursor = self.begin();
            while cursor != self.end() {
                let (_, changed) = self.step(cursor)?;
                if changed {
                    snapshot += 1;
                    observer(snapshot, &self.net);
                    changed_any = true;
                }
                cursor = cursor.next();
            }
            if !changed_any {
                break;
            }

            let measure = self.net.measure();
            debug!("pass {}: measure {:?} -> {:?}", pass, previous, measure);
            if pass > 0 && measure >= previous {
                let var = self
                    .net
                    .conflicts()
                    .first()
                    .map(|&v| self.net.variables().name(v).to_string())
                    .unwrap_or_default();
                let err = Error::Unresolvable {
                    var,
                    reason: format!("no progress in pass {}", pass),
                };
                self.failure = Some(err.clone());
                return Err(err);
            }
            previous = measure;
            pass += 1;
        }

        info!(
            "reshuffled in {} passes: {} rewrites, {} terms, {} variables",
            pass + 1,
            self.counter,
            self.net.len(),
            self.net.variables().len()
        );
        Ok(self.counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::parse::parse_prs;

    fn load(text: &str, config: Config) -> (Bubble, VariableSet) {
        let mut vars = VariableSet::new();
        let rules = parse_prs(text, &mut vars).unwrap();
        (Bubble::load_with_config(&rules, &vars, config).unwrap(), vars)
    }

    #[test]
    fn test_no_conflict_no_rewrites() {
        let (mut bub, _) = load("a & b -> c+", Config::default());
        let mut cursor = bub.begin();
        while cursor != bub.end() {
            assert_eq!(bub.step(cursor).unwrap(), (0, false));
            cursor = cursor.next();
        }
        assert_eq!(bub.reshuffle().unwrap(), 0);
    }

    #[test]
    fn test_bubbled_root_is_flipped() {
        let (mut bub, _) = load("~(a & b) -> c-", Config::default());
        assert_eq!(bub.step(bub.begin()).unwrap(), (1, true));
        let root = bub.begin();
        assert!(!bub.net().term(root).bubble);
        assert!(bub.net().children(root).iter().all(|&c| bub.net().term(c).bubble));
        // The children absorb their bubbles one by one.
        assert_eq!(bub.step(root.next()).unwrap(), (2, true));
        assert_eq!(bub.step(root.next().next()).unwrap(), (3, true));
        assert!(bub.net().is_implementable());
    }

    #[test]
    fn test_single_inverted_reader_is_buffered() {
        let (mut bub, vars) = load("x & p -> y+\n~x & q -> z+", Config::default());
        bub.reshuffle().unwrap();
        let net = bub.net();
        let x = vars.find("x").unwrap();
        let nx = net.variables().complement(x).unwrap();
        assert_eq!(net.variables().name(nx), "_x");
        assert_eq!(net.drivers(nx).len(), 2);
        assert!(net.is_implementable());
    }

    #[test]
    fn test_wide_fanout_is_duplicated() {
        let text = "
            a & b -> x-
            ~a | ~b -> x+
            x & p -> y+
            x & q -> z+
            ~x & r -> w+
        ";
        let (mut bub, vars) = load(text, Config::default());
        bub.reshuffle().unwrap();
        let net = bub.net();
        let x = vars.find("x").unwrap();
        let nx = net.variables().complement(x).unwrap();
        // Two readers need `~x`, and `x` is driven, so its logic is cloned.
        assert!(net
            .drivers(nx)
            .iter()
            .all(|&r| matches!(net.rules()[r].origin, crate::net::Origin::Duplicate(_))));
        assert!(net.is_implementable());
    }

    #[test]
    fn test_forced_buffer() {
        let text = "
            a & b -> x-
            ~a | ~b -> x+
            x & p -> y+
            x & q -> z+
            ~x & r -> w+
        ";
        let config = Config {
            strategy: Strategy::Buffer,
            ..Config::default()
        };
        let (mut bub, vars) = load(text, config);
        bub.reshuffle().unwrap();
        let net = bub.net();
        let nx = net.variables().complement(vars.find("x").unwrap()).unwrap();
        assert!(net
            .drivers(nx)
            .iter()
            .all(|&r| net.rules()[r].origin == crate::net::Origin::Inverter));
        assert!(net.is_implementable());
    }

    #[test]
    fn test_duplication_budget_exhausted() {
        let text = "
            a & b -> x-
            ~a | ~b -> x+
            x & p -> y+
            ~x & r -> w+
        ";
        let config = Config {
            strategy: Strategy::Duplicate,
            duplication_budget: 2,
            ..Config::default()
        };
        let (mut bub, mut vars) = load(text, config);
        let err = bub.reshuffle().unwrap_err();
        assert!(matches!(err, Error::Unresolvable { ref var, .. } if var == "x"));

        // The failed network can neither be stepped nor saved.
        assert_eq!(bub.step(bub.begin()).unwrap_err(), err);
        let mut rules = RuleSet::new();
        assert_eq!(bub.save(&mut rules, &mut vars).unwrap_err(), err);
    }

    #[test]
    fn test_step_out_of_range() {
        let (mut bub, _) = load("a -> b+", Config::default());
        let end = bub.end();
        assert!(matches!(bub.step(end), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_observer_sees_every_change() {
        let (mut bub, _) = load("~(a & b) -> c-\nx & p -> y+\n~x & q -> z+", Config::default());
        let mut seen = Vec::new();
        let counter = bub.reshuffle_observed(|i, net| seen.push((i, net.len()))).unwrap();
        assert!(!seen.is_empty());
        assert!(seen.len() <= counter);
        assert_eq!(seen.first().map(|s| s.0), Some(1));
        for (k, &(i, _)) in seen.iter().enumerate() {
            assert_eq!(i, k + 1);
        }
    }
}
