//! The language server: UTF-16-addressed text buffers, the document store,
//! JSON-RPC framing and dispatch, and the two-tier scheduler.

pub mod context;
pub mod documents;
pub mod framing;
pub mod protocol;
pub mod routes;
pub mod scheduler;
pub mod server;
pub mod text_document;
pub mod trace;
pub mod transport;

pub use context::{Context, TraceLevel};
pub use documents::{DocumentStore, SyncKind};
pub use server::Server;
pub use text_document::TextDocument;
pub use transport::Connection;
