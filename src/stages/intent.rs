//! Intent Interpreter

use serde_json::json;

use super::Stages;
use crate::domain::Stage;
use crate::error::Result;

impl Stages {
    /// Interpret the goal in light of the focus area.
    ///
    /// A blank answer is an `EmptyArtifact` error; the caller decides whether
    /// to continue without an intent.
    pub async fn interpret_intent(&self, goal: &str, focus_area: &str) -> Result<String> {
        self.ask(
            Stage::Interpret,
            json!({ "goal": goal, "focus_area": focus_area }),
        )
        .await
    }
}
