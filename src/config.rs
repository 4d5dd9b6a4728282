//! Reshuffling options.

use clap::ValueEnum;

use crate::net::COMPLEMENT_PREFIX;

/// How a fan-out conflict is resolved once a complement is needed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, ValueEnum)]
pub enum Strategy {
    /// Insert an inverter when the variable is a primary input or a single
    /// reader needs the inversion, duplicate the driving logic otherwise.
    #[default]
    Auto,
    /// Always insert an inverter.
    Buffer,
    /// Duplicate the driving logic of every driven variable.
    Duplicate,
}

/// Configuration of a reshuffling run.
///
/// ```
/// use bubble_rs::config::{Config, Strategy};
///
/// let config = Config {
///     strategy: Strategy::Buffer,
///     ..Config::default()
/// };
/// assert_eq!(config.complement_prefix, "_");
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    pub strategy: Strategy,
    /// Maximum number of terms created by duplication over the whole run.
    pub duplication_budget: usize,
    /// Prefix of the names given to complement variables.
    pub complement_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: Strategy::Auto,
            duplication_budget: 4096,
            complement_prefix: COMPLEMENT_PREFIX.to_string(),
        }
    }
}
