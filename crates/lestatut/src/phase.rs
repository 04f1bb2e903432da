//! Command processing phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage applied uniformly across all commands before advancing to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandPhase {
    /// Pre-registration of result names before anything executes.
    Discovery,
    /// Side-effect free parameter validation.
    Initialization,
    /// Actual execution.
    Run,
}

impl CommandPhase {
    /// All phases in execution order.
    pub const ALL: [CommandPhase; 3] = [
        CommandPhase::Discovery,
        CommandPhase::Initialization,
        CommandPhase::Run,
    ];

    /// Upper-case name used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CommandPhase::Discovery => "DISCOVERY",
            CommandPhase::Initialization => "INITIALIZATION",
            CommandPhase::Run => "RUN",
        }
    }

    /// Position of the phase in [`CommandPhase::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            CommandPhase::Discovery => 0,
            CommandPhase::Initialization => 1,
            CommandPhase::Run => 2,
        }
    }
}

impl fmt::Display for CommandPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
