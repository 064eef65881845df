//! Prompt expansion.
//!
//! The prompt shown during each phase is resolved once, when the trial is
//! built, into a [`PromptMap`] covering every phase of the behaviour.

use indexmap::IndexMap;

use super::name::PhaseName;

/// Rule deciding what a single shared prompt string expands to for a phase.
pub type PromptRule = fn(PhaseName, &str) -> String;

/// Shows the shared prompt unchanged during every phase.
#[must_use]
pub fn replicate(_phase: PhaseName, prompt: &str) -> String {
    prompt.to_owned()
}

/// Total mapping from phase to prompt content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptMap {
    entries: IndexMap<PhaseName, String>,
}

impl PromptMap {
    /// Builds a map from `(phase, content)` pairs.
    pub fn from_entries(entries: impl IntoIterator<Item = (PhaseName, String)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Returns the prompt for `phase`.
    ///
    /// Phases outside the behaviour resolve to the empty prompt.
    #[must_use]
    pub fn get(&self, phase: PhaseName) -> &str {
        self.entries.get(&phase).map_or("", String::as_str)
    }

    /// Iterates over `(phase, prompt)` pairs in phase order.
    pub fn iter(&self) -> impl Iterator<Item = (PhaseName, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Number of phases covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map covers no phase.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_phase_is_empty() {
        let map = PromptMap::from_entries([(PhaseName::Begin, "Look".to_string())]);
        assert_eq!(map.get(PhaseName::Begin), "Look");
        assert_eq!(map.get(PhaseName::ShowAdvice), "");
    }

    #[test]
    fn test_replicate_ignores_phase() {
        assert_eq!(replicate(PhaseName::End, "same"), "same");
    }
}
