//! Pulling the caller-visible error out of a failed command.

use serde_json::Value;

use crate::command::{CommandResponse, CommandStatus};

/// Return the error detail of a completed-failure response: the first
/// element of `result.results`.
///
/// Any other shape (pending, succeeded, empty results, rejected envelope)
/// yields `None` and is logged rather than treated as an error.
pub fn extract_error(response: &CommandResponse) -> Option<&Value> {
    let Some(result) = response.result.as_ref() else {
        tracing::warn!(status = %response.status, "Failure response carries no result");
        return None;
    };

    if response.command_status() != Some(CommandStatus::Failed) {
        tracing::warn!(
            correlation_id = %result.id,
            is_done = result.is_done,
            failed = result.failed,
            "Response is not a completed failure",
        );
        return None;
    }

    let detail = result.results.first();
    if detail.is_none() {
        tracing::warn!(correlation_id = %result.id, "Failed command has no error detail");
    }
    detail
}

/// Render the extracted error detail as a human-readable message.
///
/// A bare string is returned as-is; an object's `error` or `message`
/// string field is preferred; anything else falls back to its JSON text.
pub fn extract_error_message(response: &CommandResponse) -> Option<String> {
    let detail = extract_error(response)?;
    let message = match detail {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("error")
            .or_else(|| map.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| detail.to_string()),
        other => other.to_string(),
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandResult;
    use serde_json::json;

    fn completed(failed: bool, results: Vec<Value>) -> CommandResponse {
        CommandResponse::ok(CommandResult {
            id: "cmd2".into(),
            is_done: true,
            failed,
            results,
        })
    }

    #[test]
    fn first_result_is_the_error() {
        let resp = completed(
            true,
            vec![json!({ "error": "disk full" }), json!({ "error": "later" })],
        );
        assert_eq!(extract_error(&resp), Some(&json!({ "error": "disk full" })));
    }

    #[test]
    fn success_response_yields_nothing() {
        let resp = completed(false, vec![json!({ "ok": true })]);
        assert_eq!(extract_error(&resp), None);
    }

    #[test]
    fn empty_results_yield_nothing() {
        let resp = completed(true, vec![]);
        assert_eq!(extract_error(&resp), None);
    }

    #[test]
    fn rejected_envelope_yields_nothing() {
        let resp = CommandResponse {
            status: "error".into(),
            result: None,
        };
        assert_eq!(extract_error(&resp), None);
    }

    #[test]
    fn message_prefers_error_field() {
        let resp = completed(true, vec![json!({ "error": "disk full", "code": 28 })]);
        assert_eq!(extract_error_message(&resp).as_deref(), Some("disk full"));
    }

    #[test]
    fn message_uses_bare_string() {
        let resp = completed(true, vec![json!("quota exceeded")]);
        assert_eq!(extract_error_message(&resp).as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn message_falls_back_to_json_text() {
        let resp = completed(true, vec![json!({ "code": 28 })]);
        assert_eq!(extract_error_message(&resp).as_deref(), Some(r#"{"code":28}"#));
    }
}
