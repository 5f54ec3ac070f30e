//! Dispatch configuration.

use serde::{Deserialize, Serialize};

/// Configuration for building method sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// What to do when an unconstrained definition replaces a dispatch
    /// table that already holds constrained variants.
    pub shadowing: ShadowPolicy,
}

impl DispatchConfig {
    /// Set the shadowing policy.
    pub fn with_shadowing(mut self, shadowing: ShadowPolicy) -> Self {
        self.shadowing = shadowing;
        self
    }
}

/// Policy for unconstrained definitions that follow constrained ones.
///
/// The default must be defined before any constrained variant of the same
/// method. A later unconstrained definition replaces the whole table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowPolicy {
    /// Replace the table silently.
    Allow,
    /// Replace the table and log a warning naming the discarded variants.
    #[default]
    Warn,
    /// Refuse the definition.
    Deny,
}
