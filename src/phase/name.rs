//! Phase identifiers.

use serde::{Deserialize, Serialize};

/// Identifier of a trial phase.
///
/// Serialized in camelCase (`"showStim"`, `"getFinalResponse"`, ...), which is
/// also the form used in logs, events and prompt mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhaseName {
    /// Marks the trial start clock and shows the stimulus.
    Begin,
    /// Stimulus is visible.
    ShowStim,
    /// Stimulus has been hidden.
    HideStim,
    /// First response collection.
    GetResponse,
    /// Advisors present their advice.
    ShowAdvice,
    /// Second response collection after advice.
    GetFinalResponse,
    /// Optional feedback callback.
    ShowFeedback,
    /// Records the end time.
    End,
    /// Hands shared resources back to a neutral state.
    Cleanup,
}

impl PhaseName {
    /// Every known phase, in the order of the longest built-in behaviour.
    pub const ALL: [Self; 9] = [
        Self::Begin,
        Self::ShowStim,
        Self::HideStim,
        Self::GetResponse,
        Self::ShowAdvice,
        Self::GetFinalResponse,
        Self::ShowFeedback,
        Self::End,
        Self::Cleanup,
    ];

    /// Returns the camelCase name of the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::ShowStim => "showStim",
            Self::HideStim => "hideStim",
            Self::GetResponse => "getResponse",
            Self::ShowAdvice => "showAdvice",
            Self::GetFinalResponse => "getFinalResponse",
            Self::ShowFeedback => "showFeedback",
            Self::End => "end",
            Self::Cleanup => "cleanup",
        }
    }
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhaseName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown phase '{s}'"))
    }
}
