use std::fmt;

/// Council pipeline stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Independent answers from every council model.
    One,
    /// Peer review of the Stage 1 answers.
    Two,
    /// Chairman synthesis.
    Three,
}

impl Stage {
    /// Returns the stage number (1-3).
    pub fn number(self) -> u8 {
        match self {
            Stage::One => 1,
            Stage::Two => 2,
            Stage::Three => 3,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {}", self.number())
    }
}

/// Typed event decoded from one `data:` line of the message stream.
///
/// The JSON `type` field selects the variant. Extra fields are ignored and
/// unrecognised kinds decode to [`StreamEvent::Unknown`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "stage1_start")]
    Stage1Start,
    #[serde(rename = "stage1_response")]
    Stage1Response { model: String, response: String },
    #[serde(rename = "stage2_start")]
    Stage2Start,
    #[serde(rename = "stage2_review")]
    Stage2Review {
        reviewer: String,
        target: String,
        review: String,
    },
    #[serde(rename = "stage3_start")]
    Stage3Start,
    #[serde(rename = "stage3_response")]
    Stage3Response { model: String, response: String },
    /// Failure reported by the remote pipeline.
    #[serde(rename = "error")]
    Error { message: String },
    /// The pipeline finished.
    #[serde(rename = "done")]
    Done,
    /// Any kind this client does not know yet.
    #[serde(rename = "unknown")]
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Stage1Start => "stage1_start",
            StreamEvent::Stage1Response { .. } => "stage1_response",
            StreamEvent::Stage2Start => "stage2_start",
            StreamEvent::Stage2Review { .. } => "stage2_review",
            StreamEvent::Stage3Start => "stage3_start",
            StreamEvent::Stage3Response { .. } => "stage3_response",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Done => "done",
            StreamEvent::Unknown => "unknown",
        }
    }

    /// Stage the event belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            StreamEvent::Stage1Start | StreamEvent::Stage1Response { .. } => Some(Stage::One),
            StreamEvent::Stage2Start | StreamEvent::Stage2Review { .. } => Some(Stage::Two),
            StreamEvent::Stage3Start | StreamEvent::Stage3Response { .. } => Some(Stage::Three),
            StreamEvent::Error { .. } | StreamEvent::Done | StreamEvent::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_known_kinds_by_type_field() {
        let event: StreamEvent = serde_json::from_str(
            r#"{"type":"stage2_review","reviewer":"a","target":"b","review":"fine"}"#,
        )
        .expect("decode");
        assert_eq!(
            event,
            StreamEvent::Stage2Review {
                reviewer: "a".into(),
                target: "b".into(),
                review: "fine".into(),
            }
        );
        assert_eq!(event.stage(), Some(Stage::Two));
    }

    #[test]
    fn stage_serializes_in_snake_case() {
        assert_eq!(serde_json::to_value(Stage::Three).expect("encode"), "three");
        let stage: Stage = serde_json::from_str("\"one\"").expect("decode");
        assert_eq!(stage, Stage::One);
    }

    #[test]
    fn unit_kinds_ignore_extra_fields() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"done","metadata":{"cost":0.1}}"#).expect("decode");
        assert_eq!(event, StreamEvent::Done);
    }

    #[test]
    fn unrecognised_kind_maps_to_unknown() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"title_complete","title":"x"}"#).expect("decode");
        assert_eq!(event, StreamEvent::Unknown);
        assert_eq!(event.kind(), "unknown");
    }

    #[test]
    fn kind_matches_serialized_tag() {
        let event = StreamEvent::Stage3Response {
            model: "chair".into(),
            response: "final".into(),
        };
        let value = serde_json::to_value(&event).expect("encode");
        assert_eq!(value["type"], event.kind());
    }
}
