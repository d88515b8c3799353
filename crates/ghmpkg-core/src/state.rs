use std::fmt;

use ghmpkg_events::Outcome;
use serde::{Deserialize, Serialize};

/// Outcome of a file, version or package transfer.
///
/// `Skipped` means the artifact was already present at the destination and no
/// transfer happened; it is distinct from `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultState {
    Success,
    Skipped,
    Failed,
}

impl ResultState {
    /// Rolls child outcomes up into their parent's outcome.
    ///
    /// Any `Failed` child makes the parent `Failed`; otherwise any `Skipped` child
    /// makes it `Skipped`; otherwise (including no children) it is `Success`.
    pub fn roll_up<I>(children: I) -> ResultState
    where
        I: IntoIterator<Item = ResultState>,
    {
        children
            .into_iter()
            .fold(ResultState::Success, |acc, state| {
                match (acc, state) {
                    (ResultState::Failed, _) | (_, ResultState::Failed) => ResultState::Failed,
                    (ResultState::Skipped, _) | (_, ResultState::Skipped) => ResultState::Skipped,
                    _ => ResultState::Success,
                }
            })
    }
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultState::Success => write!(f, "Success"),
            ResultState::Skipped => write!(f, "Skipped"),
            ResultState::Failed => write!(f, "Failed"),
        }
    }
}

impl From<ResultState> for Outcome {
    fn from(state: ResultState) -> Self {
        match state {
            ResultState::Success => Outcome::Success,
            ResultState::Skipped => Outcome::Skipped,
            ResultState::Failed => Outcome::Failed,
        }
    }
}
