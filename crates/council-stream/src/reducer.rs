//! Pure fold of decoded events into [`StageState`].
//!
//! Events are applied in decode order only. Stage 2 reviews may arrive before
//! every Stage 1 answer has been flushed, so nothing here reorders by stage.

use crate::errors::TerminalFailure;
use crate::event::{Stage, StreamEvent};
use crate::state::{FinalAnswer, ReviewKey, StageState, StageStatus};

/// Applies one event and returns the next state.
pub fn apply(mut state: StageState, event: &StreamEvent) -> StageState {
    match event {
        StreamEvent::Stage1Start => state.active_stage = Some(Stage::One),
        StreamEvent::Stage2Start => state.active_stage = Some(Stage::Two),
        StreamEvent::Stage3Start => state.active_stage = Some(Stage::Three),
        StreamEvent::Stage1Response { model, response } => {
            state.stage1.insert(model.clone(), response.clone());
        }
        StreamEvent::Stage2Review {
            reviewer,
            target,
            review,
        } => {
            state
                .stage2
                .insert(ReviewKey::new(reviewer.as_str(), target.as_str()), review.clone());
        }
        StreamEvent::Stage3Response { model, response } => {
            state.stage3 = Some(FinalAnswer {
                model: model.clone(),
                response: response.clone(),
            });
        }
        StreamEvent::Error { message } => {
            state.status = StageStatus::Failed;
            state.error_detail = Some(message.clone());
        }
        StreamEvent::Done => {
            if state.status != StageStatus::Failed {
                state.status = StageStatus::Completed;
            }
        }
        StreamEvent::Unknown => {}
    }
    state
}

/// Folds a sequence of events from the initial state.
pub fn fold<'a>(events: impl IntoIterator<Item = &'a StreamEvent>) -> StageState {
    events.into_iter().fold(StageState::default(), apply)
}

/// Marks the state failed for a session-level reason (transport, cancel,
/// premature close). Results gathered so far are kept.
pub(crate) fn fail(mut state: StageState, failure: &TerminalFailure) -> StageState {
    state.status = StageStatus::Failed;
    state.error_detail = Some(failure.to_string());
    state
}
