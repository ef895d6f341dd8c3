//! Decoding of streamed completion chunks into [`StreamDelta`]s.
//!
//! Each `data: ` payload is a JSON chunk whose first choice carries
//! independent `content` and `reasoning` fragments.  Both channels may appear
//! in the same chunk; they are kept apart so the caller can store them in
//! distinct fields.

use crate::error::{Error, Result};
use crate::types::{ChatCompletion, StreamDelta};

/// Parse one SSE payload.
///
/// Returns `Ok(None)` for well-formed chunks that carry nothing (no choices,
/// or a first choice with neither fragment nor finish reason), and
/// [`Error::MalformedFrame`] when the payload is not a valid chunk.
pub fn parse_delta(payload: &str) -> Result<Option<StreamDelta>> {
    let chunk: ChatCompletion = serde_json::from_str(payload).map_err(|e| {
        Error::malformed_frame(format!("invalid JSON in stream frame: {e}"), payload)
    })?;
    Ok(delta_from_chunk(&chunk))
}

/// Extract the delta carried by an already-decoded chunk.
pub fn delta_from_chunk(chunk: &ChatCompletion) -> Option<StreamDelta> {
    if let Some(error) = &chunk.error {
        let message = match (error.message(), error.code_string()) {
            (Some(message), Some(code)) => format!("{message} (code {code})"),
            (Some(message), None) => message.to_string(),
            (None, Some(code)) => format!("provider error (code {code})"),
            (None, None) => "provider reported an error".to_string(),
        };
        return Some(StreamDelta {
            error: Some(message),
            is_terminal: true,
            ..StreamDelta::default()
        });
    }

    let choice = chunk.choices.first()?;
    let fragments = choice.delta.as_ref();
    let delta = StreamDelta {
        content: fragments.and_then(|d| non_empty(d.content.as_deref())),
        reasoning: fragments.and_then(|d| non_empty(d.reasoning.as_deref())),
        is_terminal: choice.finish_reason.is_some(),
        error: None,
    };
    if delta.is_empty() { None } else { Some(delta) }
}

fn non_empty(fragment: Option<&str>) -> Option<String> {
    fragment.filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_fragment() {
        let delta = parse_delta(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(delta, StreamDelta::content("Hi"));
    }

    #[test]
    fn both_channels_in_one_delta() {
        let delta =
            parse_delta(r#"{"choices":[{"delta":{"content":"answer","reasoning":"because"}}]}"#)
                .unwrap()
                .unwrap();
        assert_eq!(delta.content.as_deref(), Some("answer"));
        assert_eq!(delta.reasoning.as_deref(), Some("because"));
        assert!(!delta.is_terminal);
    }

    #[test]
    fn null_and_empty_fields_are_absent() {
        let payload = r#"{"choices":[{"delta":{"role":"assistant","content":"","reasoning":null}}]}"#;
        assert_eq!(parse_delta(payload).unwrap(), None);
    }

    #[test]
    fn empty_choices_yield_nothing() {
        assert_eq!(parse_delta(r#"{"id":"gen-1","choices":[]}"#).unwrap(), None);
        assert_eq!(parse_delta(r#"{"usage":{"total_tokens":9}}"#).unwrap(), None);
    }

    #[test]
    fn only_first_choice_is_used() {
        let payload = r#"{"choices":[{"delta":{"content":"a"}},{"delta":{"content":"b"}}]}"#;
        assert_eq!(
            parse_delta(payload).unwrap(),
            Some(StreamDelta::content("a"))
        );
    }

    #[test]
    fn finish_reason_marks_terminal() {
        let delta = parse_delta(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#)
            .unwrap()
            .unwrap();
        assert!(delta.is_terminal);
        assert!(delta.content.is_none());
    }

    #[test]
    fn malformed_json_is_reported_not_panicked() {
        let err = parse_delta(r#"{"choices":[{"delta":"#).unwrap_err();
        assert!(err.is_malformed_frame());
        let err = parse_delta("not json at all").unwrap_err();
        assert!(matches!(err, Error::MalformedFrame { payload, .. } if payload == "not json at all"));
    }

    #[test]
    fn in_band_error_is_terminal() {
        let delta = parse_delta(r#"{"error":{"code":429,"message":"slow down"}}"#)
            .unwrap()
            .unwrap();
        assert!(delta.is_terminal);
        assert_eq!(delta.error.as_deref(), Some("slow down (code 429)"));
    }

    #[test]
    fn null_usage_counters_keep_the_fragment() {
        let payload = r#"{"choices":[{"delta":{"content":"Hi"}}],"usage":{"prompt_tokens":3,"completion_tokens":null}}"#;
        assert_eq!(
            parse_delta(payload).unwrap(),
            Some(StreamDelta::content("Hi"))
        );
    }

    #[test]
    fn in_band_error_without_message_is_terminal() {
        let delta = parse_delta(r#"{"error":{"code":500,"message":null}}"#)
            .unwrap()
            .unwrap();
        assert!(delta.is_terminal);
        assert_eq!(delta.error.as_deref(), Some("provider error (code 500)"));
    }
}
