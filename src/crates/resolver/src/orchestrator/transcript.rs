use serde::{Deserialize, Serialize};

/// One completed step and its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub response: String,
}

/// Answers of completed steps, in order.
///
/// Never mutated in place: [`Transcript::with_entry`] consumes the
/// transcript and returns the extended one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<StepRecord>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, step: impl Into<String>, response: impl Into<String>) -> Self {
        self.entries.push(StepRecord {
            step: step.into(),
            response: response.into(),
        });
        self
    }

    pub fn entries(&self) -> &[StepRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_response(&self) -> Option<&str> {
        self.entries.last().map(|e| e.response.as_str())
    }

    pub fn into_entries(self) -> Vec<StepRecord> {
        self.entries
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| format!("Step {}: {}\nResponse: {}", i + 1, entry.step, entry.response))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Rendered prior steps, or `None` before the first completes.
    pub fn context(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.render())
        }
    }
}
