use crate::errors::DecodeFailure;
use crate::event::StreamEvent;

/// Prefix that marks a line as carrying an event payload.
pub const DATA_PREFIX: &str = "data: ";

const LINE_PREVIEW_CHARS: usize = 120;

/// Decodes one framed line.
///
/// Returns `Ok(None)` for lines that carry no event (blank keep-alives,
/// comments, `event:` lines). A `data:` line whose payload is not valid
/// UTF-8 or does not parse is a [`DecodeFailure`], which callers skip rather
/// than abort on.
pub fn decode_line(line: &[u8]) -> Result<Option<StreamEvent>, DecodeFailure> {
    let Some(payload) = line.strip_prefix(DATA_PREFIX.as_bytes()) else {
        return Ok(None);
    };
    let failure = |reason: String| DecodeFailure {
        reason,
        line: preview(line),
    };
    let payload = std::str::from_utf8(payload)
        .map_err(|e| failure(format!("payload is not valid UTF-8: {e}")))?;
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| failure(e.to_string()))?;
    if value.get("type").and_then(|v| v.as_str()).is_none() {
        return Err(failure("missing string `type` field".into()));
    }
    serde_json::from_value::<StreamEvent>(value)
        .map(Some)
        .map_err(|e| failure(e.to_string()))
}

/// Stateful decoder that counts the failures it absorbs.
#[derive(Debug, Default)]
pub struct EventDecoder {
    failures: u64,
}

impl EventDecoder {
    /// Decodes a line, counting a failure instead of propagating it.
    ///
    /// The failure is still handed back so the caller can log it.
    pub fn decode(&mut self, line: &[u8]) -> Result<Option<StreamEvent>, DecodeFailure> {
        let decoded = decode_line(line);
        if decoded.is_err() {
            self.failures = self.failures.saturating_add(1);
        }
        decoded
    }

    /// Number of `data:` lines skipped so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }
}

/// Lossy copy for logs only; never fed back into decoding.
fn preview(line: &[u8]) -> String {
    let line = String::from_utf8_lossy(line);
    match line.char_indices().nth(LINE_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &line[..idx]),
        None => line.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_data_lines_are_skipped() {
        for line in ["", ": keep-alive", "event: message", "data:{\"type\":\"done\"}", "id: 4"] {
            assert_eq!(decode_line(line.as_bytes()), Ok(None), "line {line:?}");
        }
    }

    #[test]
    fn decodes_stage1_response() {
        let event = decode_line(br#"data: {"type":"stage1_response","model":"m1","response":"hi"}"#)
            .expect("decode")
            .expect("event");
        assert_eq!(
            event,
            StreamEvent::Stage1Response {
                model: "m1".into(),
                response: "hi".into(),
            }
        );
    }

    #[test]
    fn tolerates_carriage_return_before_newline() {
        let event = decode_line(b"data: {\"type\":\"done\"}\r").expect("decode");
        assert_eq!(event, Some(StreamEvent::Done));
    }

    #[test]
    fn invalid_json_is_a_counted_failure() {
        let mut decoder = EventDecoder::default();
        let err = decoder.decode(b"data: {not valid json}").expect_err("should fail");
        assert_eq!(err.line, "data: {not valid json}");
        assert_eq!(decoder.failures(), 1);
    }

    #[test]
    fn missing_type_or_fields_are_failures() {
        let mut decoder = EventDecoder::default();
        assert!(decoder.decode(br#"data: {"model":"m1"}"#).is_err());
        assert!(decoder.decode(br#"data: {"type":"stage1_response","model":"m1"}"#).is_err());
        assert!(decoder.decode(br#"data: {"type":7}"#).is_err());
        assert!(decoder.decode(br#"data: ["done"]"#).is_err());
        assert_eq!(decoder.failures(), 4);
    }

    #[test]
    fn invalid_utf8_payload_is_a_counted_failure() {
        let mut decoder = EventDecoder::default();
        let err = decoder
            .decode(b"data: {\"type\":\"stage1_response\",\"model\":\"m1\",\"response\":\"\xFF\"}")
            .expect_err("invalid utf-8");
        assert!(err.reason.contains("UTF-8"), "reason {:?}", err.reason);
        assert_eq!(decoder.failures(), 1);
    }

    #[test]
    fn invalid_utf8_outside_data_lines_is_ignored() {
        assert_eq!(decode_line(b": \xFF keep-alive"), Ok(None));
    }

    #[test]
    fn unknown_kind_is_not_a_failure() {
        let mut decoder = EventDecoder::default();
        let event = decoder.decode(br#"data: {"type":"stage4_start"}"#).expect("decode");
        assert_eq!(event, Some(StreamEvent::Unknown));
        assert_eq!(decoder.failures(), 0);
    }

    #[test]
    fn long_lines_are_truncated_in_failure_preview() {
        let line = format!("data: {{{}", "x".repeat(500));
        let err = decode_line(line.as_bytes()).expect_err("should fail");
        assert!(err.line.ends_with("..."));
        assert!(err.line.len() < line.len());
    }
}
