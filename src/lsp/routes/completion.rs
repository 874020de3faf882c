//! textDocument/completion. Resolves the cursor to a byte offset and
//! returns an empty list; population is an extension point.

use lsp_types::{CompletionList, Position};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::lsp::context::Context;
use crate::lsp::protocol::{RequestMessage, ResponseMessage};

pub(crate) fn completion(cx: &Context, request: &RequestMessage, response: &mut ResponseMessage) {
    let params = &request.params;

    let Some(uri) = params
        .get("textDocument")
        .and_then(|doc| doc.get("uri"))
        .and_then(Value::as_str)
    else {
        warn!("Invalid textDocument/completion request");
        return;
    };
    let Some(position) = params
        .get("position")
        .and_then(|position| serde_json::from_value::<Position>(position.clone()).ok())
    else {
        warn!("Invalid textDocument/completion request");
        return;
    };

    trace!(
        "completion: file: {uri}, line: {}, character: {}",
        position.line, position.character
    );

    let Some(document) = cx.documents().get(uri) else {
        debug!("Completion in unopened document: {uri}");
        return;
    };

    let Some(offset) = document.offset(u64::from(position.line), u64::from(position.character))
    else {
        debug!("Invalid position: {}:{}", position.line, position.character);
        return;
    };

    trace!("completion: resolved cursor to byte offset {offset}");

    let list = CompletionList { is_incomplete: false, items: Vec::new() };
    response.set_result(serde_json::to_value(list).expect("completion list encode"));
}
