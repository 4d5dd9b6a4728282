//! # bubble-rs: bubble reshuffling of production rule sets
//!
//! **`bubble-rs`** rewrites a *production rule set* (PRS) so that every guard
//! can be implemented with inverting CMOS gates.
//!
//! ## What is bubble reshuffling?
//!
//! A production rule `guard -> x+` (or `x-`) drives the variable `x` up (or
//! down) whenever the boolean `guard` holds. Inverting logic only ever
//! produces negated outputs, so the inversions of a guard (its *bubbles*)
//! have to be pushed towards the inputs with De Morgan's laws, and a
//! variable read in both polarities has to be made available as a pair of
//! complementary wires. Reshuffling does both while preserving the function
//! of every rule.
//!
//! ## Key Features
//!
//! - **Stable handles**: The [`Network`][crate::net::Network] keeps every
//!   guard position as a term with a [`TermId`][crate::types::TermId] that is
//!   never invalidated, even as rewrites append new terms.
//! - **Stepping**: [`Bubble::step`][crate::bubble::Bubble::step] rewrites one
//!   term at a time, so a driver can snapshot the network after every change.
//! - **Two ways to complement**: inverter insertion or duplication of the
//!   driving logic, chosen by a [`Strategy`][crate::config::Strategy].
//! - **Visualization**: every snapshot renders to Graphviz via [`dot`].
//!
//! ## Basic Usage
//!
//! ```rust
//! use bubble_rs::bubble::Bubble;
//! use bubble_rs::parse::parse_prs;
//! use bubble_rs::variable::VariableSet;
//!
//! // 1. Import the rule set
//! let mut vars = VariableSet::new();
//! let mut rules = parse_prs("~(a & b) -> c-\nx & p -> y+\n~x & q -> z+", &mut vars).unwrap();
//!
//! // 2. Reshuffle to the fixpoint
//! let mut bub = Bubble::load(&rules, &vars).unwrap();
//! bub.reshuffle().unwrap();
//! assert!(bub.net().is_implementable());
//!
//! // 3. Write the result back
//! bub.save(&mut rules, &mut vars).unwrap();
//! assert_eq!(rules.get(0).unwrap().guard.display(&vars).to_string(), "~a|~b");
//! ```
//!
//! ## Core Components
//!
//! - **[`expr`]** and **[`rule`]**: Guards, rules and rule sets.
//! - **[`net`]**: The term network with fan-in and fan-out indices.
//! - **[`bubble`]**: The reshuffler.
//! - **[`parse`]**: PRS text import.

pub mod bubble;
pub mod config;
pub mod dot;
pub mod error;
pub mod expr;
pub mod net;
pub mod parse;
pub mod rule;
pub mod types;
pub mod variable;
