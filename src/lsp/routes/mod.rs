//! Method handlers, one function per route. Requests receive a response
//! object to fill in; notifications only see their params.

mod completion;
mod lifecycle;
mod text_sync;

pub(super) use completion::completion;
pub(super) use lifecycle::{exit, initialize, initialized, set_trace, shutdown};
pub(super) use text_sync::{did_change, did_close, did_open, did_save};
