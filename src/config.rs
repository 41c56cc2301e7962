//! Knowledge base configuration and the logging collaborator built from it.

use log::Level;
use std::fmt;

/// How much of its work the knowledge base reports through `log`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Nothing is logged
    Silent,
    /// Assertions, retractions and queries
    #[default]
    Operations,
    /// Everything above, plus every inference attempt and derivation
    Inference,
}

/// Configuration for a [`KnowledgeBase`](crate::KnowledgeBase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KbConfig {
    /// What gets logged
    pub verbosity: Verbosity,
    /// Re-check provenance invariants after each assert/retract (debug builds only)
    pub check_invariants: bool,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::default(),
            check_invariants: true,
        }
    }
}

impl KbConfig {
    /// Sets the verbosity.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Enables or disables invariant checking.
    #[must_use]
    pub fn with_invariant_checks(mut self, enabled: bool) -> Self {
        self.check_invariants = enabled;
        self
    }
}

/// Logging collaborator handed to the knowledge base and inference engine.
///
/// Messages go to the `log` facade under the `chainlog` target; which ones are
/// emitted at all is decided by the configured [`Verbosity`].
#[derive(Debug, Clone, Copy)]
pub struct Trace {
    verbosity: Verbosity,
}

impl Trace {
    const TARGET: &'static str = "chainlog";

    /// Creates a trace that emits messages up to `verbosity`.
    #[must_use]
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// Logs a top-level operation (assert, retract, ask).
    pub fn operation(self, args: fmt::Arguments<'_>) {
        if self.verbosity >= Verbosity::Operations {
            log::log!(target: Self::TARGET, Level::Info, "{args}");
        }
    }

    /// Logs bookkeeping inside an operation (merges, cascades).
    pub fn detail(self, args: fmt::Arguments<'_>) {
        if self.verbosity >= Verbosity::Operations {
            log::log!(target: Self::TARGET, Level::Debug, "{args}");
        }
    }

    /// Logs a single inference attempt.
    pub fn inference(self, args: fmt::Arguments<'_>) {
        if self.verbosity >= Verbosity::Inference {
            log::log!(target: Self::TARGET, Level::Trace, "{args}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_ordering() {
        assert!(Verbosity::Silent < Verbosity::Operations);
        assert!(Verbosity::Operations < Verbosity::Inference);
        assert_eq!(KbConfig::default().verbosity, Verbosity::Operations);
    }

    #[test]
    fn test_builder() {
        let config = KbConfig::default()
            .with_verbosity(Verbosity::Inference)
            .with_invariant_checks(false);
        assert_eq!(config.verbosity, Verbosity::Inference);
        assert!(!config.check_invariants);
    }
}
