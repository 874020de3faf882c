//! Server context: lifecycle flags, the document store, the guarded write
//! half of the transport, and message dispatch.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::documents::{DocumentStore, SyncKind};
use super::framing::write_frame;
use super::protocol::{
    ErrorCode, Message, NotificationMessage, RequestMessage, ResponseMessage,
    log_trace_notification,
};
use super::routes;
use super::trace as trace_bridge;

/// How much of the log stream is mirrored to the client as `$/logTrace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TraceLevel {
    Off = 0,
    Messages = 1,
    Verbose = 2,
}

impl TraceLevel {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "off" => Some(TraceLevel::Off),
            "messages" => Some(TraceLevel::Messages),
            "verbose" => Some(TraceLevel::Verbose),
            _ => None,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => TraceLevel::Messages,
            2 => TraceLevel::Verbose,
            _ => TraceLevel::Off,
        }
    }
}

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1B\[[0-9;]*[A-Za-z]").unwrap());

fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

pub struct Context {
    writer: Mutex<Box<dyn Write + Send>>,
    documents: DocumentStore,
    initialized: AtomicBool,
    exit_requested: AtomicBool,
    trace_level: AtomicU8,
}

impl Context {
    pub fn new(writer: Box<dyn Write + Send>, sync_kind: SyncKind) -> Arc<Self> {
        Arc::new(Self {
            writer: Mutex::new(writer),
            documents: DocumentStore::new(sync_kind),
            initialized: AtomicBool::new(false),
            exit_requested: AtomicBool::new(false),
            trace_level: AtomicU8::new(TraceLevel::Off as u8),
        })
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn set_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested.load(Ordering::SeqCst)
    }

    pub fn request_exit(&self) {
        self.exit_requested.store(true, Ordering::SeqCst);
    }

    pub fn trace_level(&self) -> TraceLevel {
        TraceLevel::from_u8(self.trace_level.load(Ordering::SeqCst))
    }

    pub fn set_trace_level(&self, level: TraceLevel) {
        self.trace_level.store(level as u8, Ordering::SeqCst);
    }

    /// Register this context as the `$/logTrace` sink for the process-wide
    /// trace mirror layer.
    pub fn install_trace_mirror(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        trace_bridge::set_trace_sink(Arc::new(move |level, line| {
            if let Some(context) = weak.upgrade() {
                context.forward_log_trace(level, line);
            }
        }));
    }

    fn forward_log_trace(&self, level: tracing::Level, line: &str) {
        match self.trace_level() {
            TraceLevel::Off => return,
            TraceLevel::Messages => {
                // Only events above trace severity are mirrored.
                if level == tracing::Level::TRACE {
                    return;
                }
            }
            TraceLevel::Verbose => {}
        }

        let payload = log_trace_notification(&strip_ansi(line));
        let _ = self.send_message(&payload);
    }

    /// Serialize and frame one outbound message. The mutex spans the whole
    /// frame so concurrent handlers cannot interleave bytes on the wire.
    pub fn send_message(&self, payload: &Value) -> std::io::Result<()> {
        let body = serde_json::to_vec(payload)?;
        let mut writer = self.writer.lock().unwrap();
        write_frame(writer.as_mut(), &body)
    }

    /// Dispatch one classified message.
    pub fn execute(&self, message: &Message) {
        match message {
            Message::Notification(notification) => {
                debug!("Executing notification \"{}\"", notification.method);
                self.execute_notification(notification);
            }
            Message::Request(request) => {
                debug!("Executing request \"{}\"", request.method);
                let response = self.execute_request(request);
                if let Err(e) = self.send_message(&response.to_json()) {
                    warn!("Failed to write response for \"{}\": {e}", request.method);
                }
            }
            Message::Response { .. } => {
                // Servers do not issue client-bound requests, so nothing
                // correlates with an inbound response.
                debug!("Ignoring inbound response message");
            }
        }
    }

    fn execute_request(&self, request: &RequestMessage) -> ResponseMessage {
        let method = request.method.as_str();
        let mut response = ResponseMessage::for_request(request);

        let known = matches!(
            method,
            "initialize" | "shutdown" | "textDocument/completion"
        );

        if !known {
            if method.starts_with("$/") {
                debug!("Ignoring request \"{method}\"");
            } else {
                warn!("No route found for request \"{method}\"");
            }
            response.set_error(ErrorCode::MethodNotFound);
            return response;
        }

        if !self.is_initialized() && method != "initialize" {
            warn!("Server not initialized, rejecting request \"{method}\"");
            response.set_error(ErrorCode::ServerNotInitialized);
            return response;
        }

        match method {
            "initialize" => routes::initialize(self, request, &mut response),
            "shutdown" => routes::shutdown(self, request, &mut response),
            "textDocument/completion" => routes::completion(self, request, &mut response),
            _ => unreachable!("route table covers every known method"),
        }

        response
    }

    fn execute_notification(&self, notification: &NotificationMessage) {
        let method = notification.method.as_str();

        type Handler = fn(&Context, &Value);
        let handler: Option<Handler> = match method {
            "initialized" => Some(routes::initialized),
            "$/setTrace" => Some(routes::set_trace),
            "exit" => Some(routes::exit),
            "textDocument/didOpen" => Some(routes::did_open),
            "textDocument/didChange" => Some(routes::did_change),
            "textDocument/didSave" => Some(routes::did_save),
            "textDocument/didClose" => Some(routes::did_close),
            _ => None,
        };

        let Some(handler) = handler else {
            if method.starts_with("$/") {
                debug!("Ignoring notification \"{method}\"");
            } else {
                warn!("No route found for notification \"{method}\"");
            }
            return;
        };

        // Before initialize, only the lifecycle notifications get through.
        if !self.is_initialized() && !matches!(method, "initialized" | "exit") {
            warn!("Server not initialized, dropping notification \"{method}\"");
            return;
        }

        handler(self, &notification.params);
    }

    /// Detach this context from the trace mirror.
    pub fn remove_trace_mirror(&self) {
        trace_bridge::clear_trace_sink();
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use serde_json::json;

    fn request(method: &str, id: i64, params: Value) -> Message {
        Message::Request(RequestMessage {
            id: super::super::protocol::MessageId::Int(id),
            method: method.to_string(),
            params,
        })
    }

    fn notification(method: &str, params: Value) -> Message {
        Message::Notification(NotificationMessage { method: method.to_string(), params })
    }

    fn did_open_params(uri: &str) -> Value {
        json!({ "textDocument": { "uri": uri, "version": 1, "text": "hello" } })
    }

    #[test]
    fn test_requests_gated_until_initialize() {
        let (context, buffer) = test_context();

        context.execute(&request("textDocument/completion", 1, json!({})));

        let frames = decode_frames(&buffer.lock().unwrap());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["error"]["code"], -32002);
    }

    #[test]
    fn test_notifications_dropped_until_initialize() {
        let (context, _buffer) = test_context();

        context.execute(&notification("textDocument/didOpen", did_open_params("u")));
        assert!(context.documents().get("u").is_none());

        // After initialize the same notification lands.
        context.execute(&request("initialize", 1, json!({})));
        context.execute(&notification("initialized", json!({})));
        context.execute(&notification("textDocument/didOpen", did_open_params("u")));
        assert!(context.documents().get("u").is_some());
    }

    #[test]
    fn test_unknown_request_is_method_not_found_in_both_states() {
        let (context, buffer) = test_context();

        context.execute(&request("workspace/executeCommand", 1, json!({})));
        context.execute(&request("initialize", 2, json!({})));
        context.execute(&request("workspace/executeCommand", 3, json!({})));

        let frames = decode_frames(&buffer.lock().unwrap());
        assert_eq!(frames[0]["error"]["code"], -32601);
        assert!(frames[1].get("error").is_none());
        assert_eq!(frames[2]["error"]["code"], -32601);
    }

    #[test]
    fn test_exit_notification_works_before_initialize() {
        let (context, _buffer) = test_context();
        assert!(!context.exit_requested());
        context.execute(&notification("exit", Value::Null));
        assert!(context.exit_requested());
    }

    #[test]
    fn test_inbound_response_is_ignored() {
        let (context, buffer) = test_context();
        context.execute(&Message::Response { id: None });
        assert!(buffer.lock().unwrap().is_empty());
    }

    #[test]
    fn test_trace_level_roundtrip() {
        let (context, _buffer) = test_context();
        assert_eq!(context.trace_level(), TraceLevel::Off);
        context.set_trace_level(TraceLevel::Verbose);
        assert_eq!(context.trace_level(), TraceLevel::Verbose);

        assert_eq!(TraceLevel::from_str("messages"), Some(TraceLevel::Messages));
        assert_eq!(TraceLevel::from_str("bogus"), None);
    }

    #[test]
    fn test_forward_log_trace_respects_level() {
        let (context, buffer) = test_context();

        context.forward_log_trace(tracing::Level::INFO, "hidden");
        assert!(buffer.lock().unwrap().is_empty());

        context.set_trace_level(TraceLevel::Messages);
        context.forward_log_trace(tracing::Level::TRACE, "still hidden");
        assert!(buffer.lock().unwrap().is_empty());

        context.forward_log_trace(tracing::Level::INFO, "\x1b[32mgreen\x1b[0m text");
        let frames = decode_frames(&buffer.lock().unwrap());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["method"], "$/logTrace");
        assert_eq!(frames[0]["params"]["message"], "green text");

        context.set_trace_level(TraceLevel::Verbose);
        context.forward_log_trace(tracing::Level::TRACE, "now visible");
        assert_eq!(decode_frames(&buffer.lock().unwrap()).len(), 2);
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1;31mred\x1b[0m"), "red");
        assert_eq!(strip_ansi("plain"), "plain");
    }
}
