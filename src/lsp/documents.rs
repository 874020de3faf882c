//! The document store: URI -> current text buffer, mutated only by the five
//! synchronization events. A single mutex serializes every operation, which
//! also gives per-document ordering.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lsp_types::Range;
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::text_document::{DocumentVersion, TextDocument, offset_of};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document already open: {0}")]
    AlreadyOpen(String),

    #[error("Document not open: {0}")]
    NotOpen(String),

    #[error("Position {line}:{character} does not resolve to an offset")]
    BadPosition { line: u32, character: u32 },

    #[error("Edit range [{start}, {end}) is out of bounds (document is {len} bytes)")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },
}

/// One incremental content change: replace `range` (UTF-16 coordinates)
/// with `text`.
#[derive(Debug, Clone, PartialEq)]
pub struct IncrementalChange {
    pub range: Range,
    pub text: String,
}

/// How the client was asked to ship document changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    Full,
    Incremental,
}

/// Collapse CR and CRLF line terminators to a single LF. Applied on every
/// ingest path so stored buffers never contain CR bytes.
pub fn normalize_line_endings(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let ch = raw[i];
        if ch == b'\r' {
            if i + 1 < raw.len() && raw[i + 1] == b'\n' {
                i += 1;
            }
            result.push(b'\n');
        } else {
            result.push(ch);
        }
        i += 1;
    }

    result
}

#[derive(Debug)]
pub struct DocumentStore {
    files: Mutex<HashMap<String, Arc<TextDocument>>>,
    sync_kind: SyncKind,
}

impl DocumentStore {
    pub fn new(sync_kind: SyncKind) -> Self {
        Self { files: Mutex::new(HashMap::new()), sync_kind }
    }

    pub fn sync_kind(&self) -> SyncKind {
        self.sync_kind
    }

    pub fn did_open(
        &self,
        uri: &str,
        version: DocumentVersion,
        text: &str,
    ) -> Result<(), DocumentError> {
        let mut files = self.files.lock().unwrap();

        trace!("did_open({uri}, v{version}, {} bytes)", text.len());

        if files.contains_key(uri) {
            debug!("did_open: document already open: {uri}");
            return Err(DocumentError::AlreadyOpen(uri.to_string()));
        }

        let bytes = normalize_line_endings(text.as_bytes());
        files.insert(uri.to_string(), Arc::new(TextDocument::new(uri, version, bytes)));

        Ok(())
    }

    pub fn did_change_full(
        &self,
        uri: &str,
        version: DocumentVersion,
        text: &str,
    ) -> Result<(), DocumentError> {
        let mut files = self.files.lock().unwrap();

        trace!("did_change_full({uri}, v{version}, {} bytes)", text.len());

        if !files.contains_key(uri) {
            debug!("did_change_full: document not open: {uri}");
            return Err(DocumentError::NotOpen(uri.to_string()));
        }

        let bytes = normalize_line_endings(text.as_bytes());
        files.insert(uri.to_string(), Arc::new(TextDocument::new(uri, version, bytes)));

        Ok(())
    }

    /// Apply a batch of incremental edits in array order against a working
    /// copy; the version bump is atomic with the final state.
    pub fn did_change_incremental(
        &self,
        uri: &str,
        version: DocumentVersion,
        changes: &[IncrementalChange],
    ) -> Result<(), DocumentError> {
        let mut files = self.files.lock().unwrap();

        trace!("did_change_incremental({uri}, v{version}, {} change(s))", changes.len());

        let Some(current) = files.get(uri) else {
            debug!("did_change_incremental: document not open: {uri}");
            return Err(DocumentError::NotOpen(uri.to_string()));
        };

        let mut state = current.bytes().to_vec();

        for (index, change) in changes.iter().enumerate() {
            let start = change.range.start;
            let end = change.range.end;

            let start_offset = offset_of(&state, u64::from(start.line), u64::from(start.character))
                .ok_or(DocumentError::BadPosition {
                    line: start.line,
                    character: start.character,
                })?;
            let end_offset = offset_of(&state, u64::from(end.line), u64::from(end.character))
                .ok_or(DocumentError::BadPosition { line: end.line, character: end.character })?;

            trace!(
                "did_change_incremental: change #{index}: ({}:{}, o:{start_offset}) - ({}:{}, o:{end_offset})",
                start.line, start.character, end.line, end.character
            );

            if start_offset > end_offset || end_offset > state.len() {
                return Err(DocumentError::RangeOutOfBounds {
                    start: start_offset,
                    end: end_offset,
                    len: state.len(),
                });
            }

            let replacement = normalize_line_endings(change.text.as_bytes());
            state.splice(start_offset..end_offset, replacement);
        }

        files.insert(uri.to_string(), Arc::new(TextDocument::new(uri, version, state)));

        Ok(())
    }

    /// A save event. A missing document is a warning, not an error; saving
    /// with content installs it while keeping the current version number.
    pub fn did_save(&self, uri: &str, full_content: Option<&str>) {
        let mut files = self.files.lock().unwrap();

        trace!("did_save({uri})");

        let Some(current) = files.get(uri) else {
            warn!("did_save: document not open: {uri}");
            return;
        };

        if let Some(text) = full_content {
            let version = current.version();
            let bytes = normalize_line_endings(text.as_bytes());
            files.insert(uri.to_string(), Arc::new(TextDocument::new(uri, version, bytes)));
        }
    }

    pub fn did_close(&self, uri: &str) -> Result<(), DocumentError> {
        let mut files = self.files.lock().unwrap();

        trace!("did_close({uri})");

        if files.remove(uri).is_none() {
            debug!("did_close: document not open: {uri}");
            return Err(DocumentError::NotOpen(uri.to_string()));
        }

        Ok(())
    }

    pub fn get(&self, uri: &str) -> Option<Arc<TextDocument>> {
        self.files.lock().unwrap().get(uri).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::Position;

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
        Range::new(Position::new(sl, sc), Position::new(el, ec))
    }

    fn store() -> DocumentStore {
        DocumentStore::new(SyncKind::Incremental)
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings(b"a\r\nb\rc\nd"), b"a\nb\nc\nd");
        assert_eq!(normalize_line_endings(b"\r\n\r\n"), b"\n\n");
        assert_eq!(normalize_line_endings(b"no breaks"), b"no breaks");
        assert_eq!(normalize_line_endings(b""), b"");

        // Idempotent: a second pass changes nothing.
        let once = normalize_line_endings(b"a\r\nb\rc");
        assert_eq!(normalize_line_endings(&once), once);
    }

    #[test]
    fn test_open_normalizes_and_stores() {
        let store = store();
        store.did_open("u", 1, "a\r\nb\r\nc").unwrap();

        let doc = store.get("u").unwrap();
        assert_eq!(doc.bytes(), b"a\nb\nc");
        assert_eq!(doc.version(), 1);
        assert_eq!(doc.line_col(4), Some((2, 0)));
    }

    #[test]
    fn test_double_open_is_an_error() {
        let store = store();
        store.did_open("u", 1, "x").unwrap();
        assert!(matches!(
            store.did_open("u", 2, "y"),
            Err(DocumentError::AlreadyOpen(_))
        ));
    }

    #[test]
    fn test_change_full_replaces_and_normalizes() {
        let store = store();
        store.did_open("u", 1, "old").unwrap();
        store.did_change_full("u", 2, "new\r\ntext").unwrap();

        let doc = store.get("u").unwrap();
        assert_eq!(doc.bytes(), b"new\ntext");
        assert_eq!(doc.version(), 2);

        assert!(matches!(
            store.did_change_full("missing", 1, "x"),
            Err(DocumentError::NotOpen(_))
        ));
    }

    #[test]
    fn test_incremental_insert() {
        let store = store();
        store.did_open("u", 1, "hello\nworld").unwrap();
        store
            .did_change_incremental(
                "u",
                2,
                &[IncrementalChange { range: range(0, 5, 0, 5), text: ",".to_string() }],
            )
            .unwrap();

        let doc = store.get("u").unwrap();
        assert_eq!(doc.bytes(), b"hello,\nworld");
        assert_eq!(doc.version(), 2);
    }

    #[test]
    fn test_incremental_batch_applies_in_order() {
        let store = store();
        store.did_open("u", 1, "abc").unwrap();
        store
            .did_change_incremental(
                "u",
                2,
                &[
                    IncrementalChange { range: range(0, 0, 0, 1), text: "X".to_string() },
                    IncrementalChange { range: range(0, 2, 0, 3), text: "Z".to_string() },
                ],
            )
            .unwrap();

        // First edit produced "Xbc", second saw that state and produced "XbZ".
        assert_eq!(store.get("u").unwrap().bytes(), b"XbZ");
    }

    #[test]
    fn test_incremental_delete_and_replace() {
        let store = store();
        store.did_open("u", 1, "one two three").unwrap();
        store
            .did_change_incremental(
                "u",
                2,
                &[IncrementalChange { range: range(0, 4, 0, 7), text: "2".to_string() }],
            )
            .unwrap();
        assert_eq!(store.get("u").unwrap().bytes(), b"one 2 three");
    }

    #[test]
    fn test_incremental_across_lines() {
        let store = store();
        store.did_open("u", 1, "ab\ncd").unwrap();
        store
            .did_change_incremental(
                "u",
                2,
                &[IncrementalChange { range: range(0, 1, 1, 1), text: "-".to_string() }],
            )
            .unwrap();
        assert_eq!(store.get("u").unwrap().bytes(), b"a-d");
    }

    #[test]
    fn test_incremental_failure_leaves_document_unchanged() {
        let store = store();
        store.did_open("u", 1, "abc").unwrap();

        let result = store.did_change_incremental(
            "u",
            2,
            &[IncrementalChange { range: range(5, 0, 5, 1), text: "x".to_string() }],
        );
        assert!(matches!(result, Err(DocumentError::BadPosition { .. })));

        let doc = store.get("u").unwrap();
        assert_eq!(doc.bytes(), b"abc");
        assert_eq!(doc.version(), 1);
    }

    #[test]
    fn test_incremental_normalizes_inserted_text() {
        let store = store();
        store.did_open("u", 1, "ab").unwrap();
        store
            .did_change_incremental(
                "u",
                2,
                &[IncrementalChange { range: range(0, 1, 0, 1), text: "x\r\ny".to_string() }],
            )
            .unwrap();
        assert_eq!(store.get("u").unwrap().bytes(), b"ax\nyb");
    }

    #[test]
    fn test_save_with_content_keeps_version() {
        let store = store();
        store.did_open("u", 7, "before").unwrap();
        store.did_save("u", Some("after"));

        let doc = store.get("u").unwrap();
        assert_eq!(doc.bytes(), b"after");
        assert_eq!(doc.version(), 7);

        // Save without content leaves the buffer as-is.
        store.did_save("u", None);
        assert_eq!(store.get("u").unwrap().bytes(), b"after");

        // Save of an unopened document is a warning no-op, not an error.
        store.did_save("other", Some("x"));
        assert!(store.get("other").is_none());
    }

    #[test]
    fn test_close_removes_entry() {
        let store = store();
        store.did_open("u", 1, "x").unwrap();
        store.did_close("u").unwrap();
        assert!(store.get("u").is_none());
        assert!(matches!(store.did_close("u"), Err(DocumentError::NotOpen(_))));
    }

    #[test]
    fn test_incremental_matches_manual_edit() {
        // Applying the edits by hand to the pre-state gives the same bytes,
        // independent of batching.
        let store1 = store();
        store1.did_open("u", 1, "fn main() {}\n").unwrap();

        let edits = [
            IncrementalChange { range: range(0, 11, 0, 11), text: " ret 0; ".to_string() },
            IncrementalChange { range: range(0, 3, 0, 7), text: "start".to_string() },
        ];
        store1.did_change_incremental("u", 2, &edits).unwrap();
        let batched = store1.get("u").unwrap().bytes().to_vec();

        let store2 = store();
        store2.did_open("u", 1, "fn main() {}\n").unwrap();
        for (version, edit) in edits.iter().enumerate() {
            store2
                .did_change_incremental("u", 2 + version as i64, std::slice::from_ref(edit))
                .unwrap();
        }
        assert_eq!(store2.get("u").unwrap().bytes(), batched.as_slice());
    }
}
