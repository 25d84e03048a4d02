use serde::{Deserialize, Serialize};

use crate::generator::MessageStage;
use crate::pipeline::state::OutreachState;

/// Position in the outreach sequence.
///
/// The sequence is a straight line from `Discover` to `Close` with a single
/// edge from `Close` back to `Connect` while targets remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discover,
    Connect,
    Qualify,
    Present,
    Resolve,
    Close,
}

impl Stage {
    pub const ENTRY: Stage = Stage::Discover;

    /// The stage that follows `self`, or `None` once every target is done.
    pub fn next(self, state: &OutreachState) -> Option<Stage> {
        match self {
            Stage::Discover => Some(Stage::Connect),
            Stage::Connect => Some(Stage::Qualify),
            Stage::Qualify => Some(Stage::Present),
            Stage::Present => Some(Stage::Resolve),
            Stage::Resolve => Some(Stage::Close),
            Stage::Close if state.is_exhausted() => None,
            Stage::Close => Some(Stage::Connect),
        }
    }

    /// Which message this stage sends, if any.
    pub fn message(self) -> Option<MessageStage> {
        match self {
            Stage::Discover => None,
            Stage::Connect => Some(MessageStage::Sales),
            Stage::Qualify => Some(MessageStage::Discovery),
            Stage::Present => Some(MessageStage::Presentation),
            Stage::Resolve => Some(MessageStage::Objection),
            Stage::Close => Some(MessageStage::Closing),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Discover => "discover",
            Stage::Connect => "connect",
            Stage::Qualify => "qualify",
            Stage::Present => "present",
            Stage::Resolve => "resolve",
            Stage::Close => "close",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::collect_targets;

    fn state_with(n: usize, cursor: usize) -> OutreachState {
        OutreachState {
            targets: collect_targets((0..n).map(|i| format!("https://x/in/p{i}/")), n),
            cursor,
            ..OutreachState::default()
        }
    }

    #[test]
    fn test_linear_order() {
        let state = state_with(2, 0);
        let mut stage = Stage::ENTRY;
        let mut seen = vec![stage];
        while stage != Stage::Close {
            stage = stage.next(&state).unwrap();
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                Stage::Discover,
                Stage::Connect,
                Stage::Qualify,
                Stage::Present,
                Stage::Resolve,
                Stage::Close
            ]
        );
    }

    #[test]
    fn test_close_loops_back_to_connect_while_targets_remain() {
        assert_eq!(Stage::Close.next(&state_with(2, 1)), Some(Stage::Connect));
    }

    #[test]
    fn test_close_terminates_when_exhausted() {
        assert_eq!(Stage::Close.next(&state_with(2, 2)), None);
        assert_eq!(Stage::Close.next(&OutreachState::new()), None);
    }

    #[test]
    fn test_stage_serializes_as_snake_case() {
        assert_eq!(serde_json::to_string(&Stage::Present).unwrap(), "\"present\"");
    }
}
