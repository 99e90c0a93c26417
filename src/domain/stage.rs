//! Pipeline stage identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every step that talks to the backend or persists output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Turn goal + focus area into an interpretation
    Interpret,
    /// Produce the initial artifact
    Generate,
    /// Judge an artifact against the goal
    Evaluate,
    /// Improvement suggestions
    Suggest,
    /// Divergence from the seed example
    Discrepancy,
    /// Apply feedback to an artifact
    Refine,
    /// Compare new, best and previous artifacts
    Compare,
    /// Reformat an artifact into a single fenced block
    Clean,
    /// Merge latest, initial and good-enough variants
    Aggregate,
    /// Decide what the next run should work on
    NextSteps,
    /// Derive the next run's focus area
    FocusArea,
    /// Artifact file writes
    Persist,
}

impl Stage {
    /// All stages that have a prompt template, in pipeline order.
    pub const PROMPTED: [Stage; 11] = [
        Stage::Interpret,
        Stage::Generate,
        Stage::Evaluate,
        Stage::Suggest,
        Stage::Discrepancy,
        Stage::Refine,
        Stage::Compare,
        Stage::Clean,
        Stage::Aggregate,
        Stage::NextSteps,
        Stage::FocusArea,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Interpret => "interpret",
            Stage::Generate => "generate",
            Stage::Evaluate => "evaluate",
            Stage::Suggest => "suggest",
            Stage::Discrepancy => "discrepancy",
            Stage::Refine => "refine",
            Stage::Compare => "compare",
            Stage::Clean => "clean",
            Stage::Aggregate => "aggregate",
            Stage::NextSteps => "next_steps",
            Stage::FocusArea => "focus_area",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in Stage::PROMPTED {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn test_prompted_excludes_persist() {
        assert!(!Stage::PROMPTED.contains(&Stage::Persist));
        assert_eq!(Stage::PROMPTED.len(), 11);
    }

    #[test]
    fn test_stage_as_str() {
        assert_eq!(Stage::NextSteps.as_str(), "next_steps");
        assert_eq!(Stage::FocusArea.to_string(), "focus_area");
    }
}
