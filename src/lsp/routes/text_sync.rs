//! Document synchronization routes: didOpen, didChange, didSave, didClose.

use lsp_types::Range;
use serde_json::Value;
use tracing::{debug, warn};

use crate::lsp::context::Context;
use crate::lsp::documents::IncrementalChange;

fn text_document_uri(params: &Value) -> Option<&str> {
    params.get("textDocument")?.get("uri")?.as_str()
}

fn text_document_version(params: &Value) -> Option<i64> {
    params.get("textDocument")?.get("version")?.as_i64()
}

pub(crate) fn did_open(cx: &Context, params: &Value) {
    let (Some(uri), Some(version)) = (text_document_uri(params), text_document_version(params))
    else {
        warn!("Invalid textDocument/didOpen notification");
        return;
    };
    let Some(text) = params["textDocument"].get("text").and_then(Value::as_str) else {
        warn!("Invalid textDocument/didOpen notification");
        return;
    };

    if let Err(e) = cx.documents().did_open(uri, version, text) {
        warn!("Failed to open text document: {e}");
        return;
    }

    debug!("Opened text document: {uri}");
}

/// Shape-check one entry of `contentChanges`. Full changes carry only
/// `text`; incremental changes add a `range`.
fn parse_change(change: &Value) -> Option<(Option<Range>, &str)> {
    let text = change.get("text")?.as_str()?;

    match change.get("range") {
        None => Some((None, text)),
        Some(range) => {
            let range: Range = serde_json::from_value(range.clone()).ok()?;
            Some((Some(range), text))
        }
    }
}

pub(crate) fn did_change(cx: &Context, params: &Value) {
    let (Some(uri), Some(version)) = (text_document_uri(params), text_document_version(params))
    else {
        warn!("Invalid textDocument/didChange notification");
        return;
    };
    let Some(changes) = params.get("contentChanges").and_then(Value::as_array) else {
        warn!("Invalid textDocument/didChange notification");
        return;
    };

    for change in changes {
        let Some((range, text)) = parse_change(change) else {
            warn!("Invalid textDocument/didChange content change");
            return;
        };

        let applied = match range {
            Some(range) => cx.documents().did_change_incremental(
                uri,
                version,
                &[IncrementalChange { range, text: text.to_string() }],
            ),
            None => cx.documents().did_change_full(uri, version, text),
        };

        if let Err(e) = applied {
            warn!("Failed to apply changes to text document {uri}: {e}");
            return;
        }
    }

    debug!("Applied changes to text document: {uri}");
}

pub(crate) fn did_save(cx: &Context, params: &Value) {
    let Some(uri) = text_document_uri(params) else {
        warn!("Invalid textDocument/didSave notification");
        return;
    };

    // `text` is present when the save capability asked for content.
    let text = match params.get("text") {
        None => None,
        Some(text) => match text.as_str() {
            Some(text) => Some(text),
            None => {
                warn!("Invalid textDocument/didSave notification");
                return;
            }
        },
    };

    cx.documents().did_save(uri, text);
    debug!("Saved text document: {uri}");
}

pub(crate) fn did_close(cx: &Context, params: &Value) {
    let Some(uri) = text_document_uri(params) else {
        warn!("Invalid textDocument/didClose notification");
        return;
    };

    if let Err(e) = cx.documents().did_close(uri) {
        warn!("Failed to close text document: {e}");
        return;
    }

    debug!("Closed text document: {uri}");
}
