//! Lifecycle routes: initialize, shutdown, initialized, $/setTrace, exit.

use lsp_types::{
    CompletionOptions, InitializeResult, PositionEncodingKind, SaveOptions, ServerCapabilities,
    ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind, TextDocumentSyncOptions,
    TextDocumentSyncSaveOptions,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::lsp::context::{Context, TraceLevel};
use crate::lsp::protocol::{ErrorCode, RequestMessage, ResponseMessage};

pub const SERVER_NAME: &str = "nitrate-language-server";

fn capabilities() -> InitializeResult {
    InitializeResult {
        capabilities: ServerCapabilities {
            position_encoding: Some(PositionEncodingKind::UTF16),
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::INCREMENTAL),
                    save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                        include_text: Some(true),
                    })),
                    ..Default::default()
                },
            )),
            completion_provider: Some(CompletionOptions {
                trigger_characters: Some(vec![".".to_string(), "::".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        },
        server_info: Some(ServerInfo {
            name: SERVER_NAME.to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }),
    }
}

pub(crate) fn initialize(cx: &Context, request: &RequestMessage, response: &mut ResponseMessage) {
    let params = &request.params;

    if let Some(trace) = params.get("trace") {
        let Some(trace) = trace.as_str() else {
            warn!("Invalid initialize request: 'trace' is not a string");
            response.set_error(ErrorCode::InvalidRequest);
            return;
        };

        // Unknown values fall back to off.
        cx.set_trace_level(TraceLevel::from_str(trace).unwrap_or(TraceLevel::Off));
    }

    let result = capabilities();
    response.set_result(serde_json::to_value(result).expect("capabilities encode"));

    debug!("LSP initialize requested");
    cx.set_initialized();
}

/// The actual teardown is driven by the subsequent `exit` notification.
pub(crate) fn shutdown(_cx: &Context, _request: &RequestMessage, _response: &mut ResponseMessage) {
    debug!("LSP shutdown requested");
}

/// Capability sync already happened during `initialize`.
pub(crate) fn initialized(_cx: &Context, _params: &Value) {
    debug!("Client reports initialization complete");
}

pub(crate) fn set_trace(cx: &Context, params: &Value) {
    let Some(value) = params.get("value").and_then(Value::as_str) else {
        warn!("Invalid $/setTrace notification");
        return;
    };

    let Some(level) = TraceLevel::from_str(value) else {
        warn!("Invalid $/setTrace value: {value:?}");
        return;
    };

    cx.set_trace_level(level);
}

pub(crate) fn exit(cx: &Context, _params: &Value) {
    debug!("LSP exit requested");
    cx.request_exit();
}

#[cfg(test)]
mod tests {
    use crate::lsp::context::TraceLevel;
    use crate::lsp::context::test_support::{decode_frames, test_context};
    use crate::lsp::protocol::{Message, MessageId, NotificationMessage, RequestMessage};
    use serde_json::{Value, json};

    fn initialize_with(params: Value) -> (Value, bool) {
        let (context, buffer) = test_context();
        context.execute(&Message::Request(RequestMessage {
            id: MessageId::Int(1),
            method: "initialize".to_string(),
            params,
        }));
        let frames = decode_frames(&buffer.lock().unwrap());
        (frames[0].clone(), context.is_initialized())
    }

    #[test]
    fn test_initialize_reports_capabilities() {
        let (response, initialized) = initialize_with(json!({}));
        assert!(initialized);

        let result = &response["result"];
        assert_eq!(result["serverInfo"]["name"], "nitrate-language-server");
        assert_eq!(result["capabilities"]["positionEncoding"], "utf-16");
        assert_eq!(result["capabilities"]["textDocumentSync"]["openClose"], true);
        assert_eq!(result["capabilities"]["textDocumentSync"]["change"], 2);
        assert_eq!(
            result["capabilities"]["textDocumentSync"]["save"]["includeText"],
            true
        );
        assert_eq!(
            result["capabilities"]["completionProvider"]["triggerCharacters"],
            json!([".", "::"])
        );
    }

    #[test]
    fn test_initialize_stores_trace_level() {
        let (context, _buffer) = test_context();
        context.execute(&Message::Request(RequestMessage {
            id: MessageId::Int(1),
            method: "initialize".to_string(),
            params: json!({ "trace": "verbose" }),
        }));
        assert_eq!(context.trace_level(), TraceLevel::Verbose);

        // Unknown trace values fall back to off.
        let (context, _buffer) = test_context();
        context.execute(&Message::Request(RequestMessage {
            id: MessageId::Int(1),
            method: "initialize".to_string(),
            params: json!({ "trace": "chatty" }),
        }));
        assert_eq!(context.trace_level(), TraceLevel::Off);
    }

    #[test]
    fn test_initialize_rejects_non_string_trace() {
        let (response, initialized) = initialize_with(json!({ "trace": 3 }));
        assert_eq!(response["error"]["code"], -32600);
        assert!(!initialized);
    }

    #[test]
    fn test_reinitialize_latest_wins() {
        let (context, _buffer) = test_context();
        let send = |params: Value| {
            context.execute(&Message::Request(RequestMessage {
                id: MessageId::Int(1),
                method: "initialize".to_string(),
                params,
            }));
        };
        send(json!({ "trace": "verbose" }));
        send(json!({ "trace": "messages" }));
        assert_eq!(context.trace_level(), TraceLevel::Messages);
        assert!(context.is_initialized());
    }

    #[test]
    fn test_set_trace_notification() {
        let (context, _buffer) = test_context();
        context.set_initialized();

        let send = |value: Value| {
            context.execute(&Message::Notification(NotificationMessage {
                method: "$/setTrace".to_string(),
                params: value,
            }));
        };

        send(json!({ "value": "messages" }));
        assert_eq!(context.trace_level(), TraceLevel::Messages);

        // Invalid payloads leave the level untouched.
        send(json!({ "value": "loud" }));
        assert_eq!(context.trace_level(), TraceLevel::Messages);
        send(json!({}));
        assert_eq!(context.trace_level(), TraceLevel::Messages);
    }

    #[test]
    fn test_shutdown_returns_success() {
        let (context, buffer) = test_context();
        context.set_initialized();
        context.execute(&Message::Request(RequestMessage {
            id: MessageId::Int(7),
            method: "shutdown".to_string(),
            params: Value::Null,
        }));

        let frames = decode_frames(&buffer.lock().unwrap());
        assert_eq!(frames[0]["id"], 7);
        assert_eq!(frames[0]["result"], Value::Null);
        assert!(frames[0].get("error").is_none());
        assert!(!context.exit_requested());
    }
}
