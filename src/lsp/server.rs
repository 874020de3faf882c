//! The reader loop: pull framed messages off the transport, hand them to the
//! scheduler, stop on exit or a desynced stream.

use std::io::BufReader;
use std::sync::Arc;

use tracing::{error, info, trace, warn};

use super::context::Context;
use super::documents::SyncKind;
use super::framing::{FramingError, read_frame};
use super::protocol::Message;
use super::scheduler::Scheduler;
use super::transport::Connection;

/// Consecutive unreadable messages tolerated before the stream is assumed
/// desynced.
const MAX_CONSECUTIVE_FAILURES: usize = 3;

pub struct Server {
    reader: BufReader<Box<dyn std::io::Read + Send>>,
    scheduler: Scheduler,
    context: Arc<Context>,
}

impl Server {
    pub fn new(connection: Connection) -> Self {
        let context = Context::new(connection.writer, SyncKind::Incremental);
        Self {
            reader: BufReader::new(connection.reader),
            scheduler: Scheduler::new(context.clone()),
            context,
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Run until the client disconnects, requests exit, or the stream
    /// desyncs.
    pub fn run(&mut self) {
        self.context.install_trace_mirror();

        let mut consecutive_failures = 0usize;

        loop {
            let frame = match read_frame(&mut self.reader) {
                Ok(frame) => frame,
                Err(FramingError::Eof) => {
                    info!("Client closed the transport");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read message: {e}");
                    consecutive_failures += 1;
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        error!(
                            "Too many consecutive unreadable messages ({MAX_CONSECUTIVE_FAILURES}); assuming the stream is desynced"
                        );
                        break;
                    }
                    continue;
                }
            };

            let message = match Message::classify(&frame.body) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Invalid JSON-RPC message: {e}");
                    consecutive_failures += 1;
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        error!(
                            "Too many consecutive invalid messages ({MAX_CONSECUTIVE_FAILURES}); assuming the stream is desynced"
                        );
                        break;
                    }
                    continue;
                }
            };

            consecutive_failures = 0;
            self.scheduler.schedule(message);

            if self.scheduler.is_exit_requested() {
                trace!("Exit requested; leaving the reader loop");
                break;
            }
        }

        self.scheduler.shutdown();
        self.context.remove_trace_mirror();
    }
}
