//! Network to DOT (Graphviz) conversion.
//!
//! Every snapshot of a reshuffle can be rendered with `dot`, `neato` or any
//! online viewer.
//!
//! # DOT Format
//!
//! The generated DOT output follows these conventions:
//! - **Variable nodes** are ellipses labelled with the variable name
//! - **Term nodes** are circles labelled `&`, `|` or the literal (`x`, `~x`)
//! - **Rule nodes** are boxes labelled with the driven transition (`x+`)
//! - **Edges** flow from a variable to the literals that read it, from each
//!   term to its parent, from a guard root to its rule node and from the
//!   rule node to the variable it drives
//! - **Bubbles** are drawn as hollow circle arrowheads (`odot`) at the
//!   output of the bubbled term
//! - **Complement links** are dashed undirected edges between a variable
//!   and its complement
//! - **Conflicted variables** are filled with the highlight color
//!
//! # Examples
//!
//! ```
//! use bubble_rs::net::Network;
//! use bubble_rs::parse::parse_prs;
//! use bubble_rs::variable::VariableSet;
//!
//! let mut vars = VariableSet::new();
//! let rules = parse_prs("a & b -> c-", &mut vars).unwrap();
//! let net = Network::build(&rules, &vars).unwrap();
//!
//! let dot = net.to_dot().unwrap();
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! ```

use std::fmt::Write as _;

use crate::net::{Network, TermKind};

/// Configuration options for DOT output generation.
///
/// ```
/// use bubble_rs::dot::DotConfig;
///
/// let config = DotConfig {
///     rankdir: "TB",
///     show_ids: true,
///     ..DotConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Layout direction (default: "LR")
    pub rankdir: &'static str,
    /// Shape for variable nodes (default: "ellipse")
    pub variable_shape: &'static str,
    /// Shape for term nodes (default: "circle")
    pub term_shape: &'static str,
    /// Shape for rule nodes (default: "box")
    pub rule_shape: &'static str,
    /// Style for complement links (default: "dashed")
    pub complement_edge_style: &'static str,
    /// Fill color for conflicted variables (default: "salmon")
    pub conflict_color: &'static str,
    /// Whether to append term ids to the term labels (default: false)
    pub show_ids: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            rankdir: "LR",
            variable_shape: "ellipse",
            term_shape: "circle",
            rule_shape: "box",
            complement_edge_style: "dashed",
            conflict_color: "salmon",
            show_ids: false,
        }
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Network {
    /// Converts the network to DOT format with the default configuration.
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(&DotConfig::default())
    }

    /// Converts the network to DOT format.
    ///
    /// ```
    /// use bubble_rs::dot::DotConfig;
    /// use bubble_rs::net::Network;
    /// use bubble_rs::parse::parse_prs;
    /// use bubble_rs::variable::VariableSet;
    ///
    /// let mut vars = VariableSet::new();
    /// let rules = parse_prs("~(a | b) -> c+", &mut vars).unwrap();
    /// let net = Network::build(&rules, &vars).unwrap();
    ///
    /// let config = DotConfig {
    ///     show_ids: true,
    ///     ..DotConfig::default()
    /// };
    /// let dot = net.to_dot_with_config(&config).unwrap();
    /// assert!(dot.contains("arrowhead=odot"));
    /// ```
    pub fn to_dot_with_config(&self, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let vars = self.variables();
        let conflicts = self.conflicts();

        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;
        writeln!(dot, "rankdir={};", config.rankdir)?;

        // Variables
        writeln!(dot, "node [shape={}];", config.variable_shape)?;
        for (var, variable) in vars.iter() {
            if conflicts.contains(&var) {
                writeln!(
                    dot,
                    "v{} [label=\"{}\", style=filled, fillcolor={}];",
                    var.index(),
                    escape(&variable.name),
                    config.conflict_color
                )?;
            } else {
                writeln!(dot, "v{} [label=\"{}\"];", var.index(), escape(&variable.name))?;
            }
        }

        // Terms
        writeln!(dot, "node [shape={}];", config.term_shape)?;
        for id in self.ids() {
            let term = self.term(id);
            let label = match term.kind {
                TermKind::Literal(lit) => {
                    format!("{}{}", if lit.negated { "~" } else { "" }, escape(vars.name(lit.var)))
                }
                TermKind::And(_) => "&".to_string(),
                TermKind::Or(_) => "|".to_string(),
            };
            if config.show_ids {
                writeln!(dot, "t{} [label=\"{}\\n{}\"];", id.index(), label, id)?;
            } else {
                writeln!(dot, "t{} [label=\"{}\"];", id.index(), label)?;
            }
        }

        // Rules
        writeln!(dot, "node [shape={}];", config.rule_shape)?;
        for (i, rule) in self.rules().iter().enumerate() {
            writeln!(
                dot,
                "r{} [label=\"{}{}\"];",
                i,
                escape(vars.name(rule.target)),
                rule.direction
            )?;
        }

        // Reads, then structure
        for id in self.ids() {
            let term = self.term(id);
            if let TermKind::Literal(lit) = term.kind {
                writeln!(dot, "v{} -> t{};", lit.var.index(), id.index())?;
            }
            let sink = match term.parent {
                Some(parent) => format!("t{}", parent.index()),
                None => format!("r{}", term.rule),
            };
            if term.bubble {
                writeln!(dot, "t{} -> {} [arrowhead=odot];", id.index(), sink)?;
            } else {
                writeln!(dot, "t{} -> {};", id.index(), sink)?;
            }
        }

        // Drives
        for (i, rule) in self.rules().iter().enumerate() {
            writeln!(dot, "r{} -> v{};", i, rule.target.index())?;
        }

        // Complement links, once per pair
        for (var, variable) in vars.iter() {
            if let Some(complement) = variable.complement {
                if var < complement {
                    writeln!(
                        dot,
                        "v{} -> v{} [style={}, dir=none, constraint=false];",
                        var.index(),
                        complement.index(),
                        config.complement_edge_style
                    )?;
                }
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}
