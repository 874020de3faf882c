//! Two-tier scheduling: a fixed allowlist of concurrent-safe methods runs on
//! a worker pool; everything else runs inline on the reader thread after the
//! pool has drained to quiescence.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, trace};

use super::context::Context;
use super::protocol::Message;

/// Methods that neither read nor write shared server state out of order:
/// they may run on a worker concurrently with each other.
pub const CONCURRENT_SAFE_METHODS: [&str; 2] = ["$/setTrace", "textDocument/completion"];

pub fn is_concurrent_safe(method: &str) -> bool {
    CONCURRENT_SAFE_METHODS.contains(&method)
}

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A small cooperative worker pool over a mutex-protected FIFO.
pub struct ThreadPool {
    queue: Arc<Mutex<VecDeque<Task>>>,
    active: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    pub fn start() -> Self {
        let worker_count = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(1)
            .max(1);

        debug!("Starting thread pool with {worker_count} worker(s)");

        let queue: Arc<Mutex<VecDeque<Task>>> = Arc::new(Mutex::new(VecDeque::new()));
        let active = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));

        let workers = (0..worker_count)
            .map(|index| {
                let queue = queue.clone();
                let active = active.clone();
                let stop = stop.clone();
                std::thread::Builder::new()
                    .name(format!("lsp-worker-{index}"))
                    .spawn(move || Self::worker_loop(&queue, &active, &stop))
                    .expect("spawn worker thread")
            })
            .collect();

        Self { queue, active, stop, workers }
    }

    fn worker_loop(
        queue: &Mutex<VecDeque<Task>>,
        active: &AtomicUsize,
        stop: &AtomicBool,
    ) {
        trace!("worker loop started");

        while !stop.load(Ordering::SeqCst) {
            let task = {
                let mut queue = queue.lock().unwrap();
                match queue.pop_front() {
                    Some(task) => {
                        // Counted before the lock drops so idleness checks
                        // never observe a task as neither queued nor active.
                        active.fetch_add(1, Ordering::SeqCst);
                        Some(task)
                    }
                    None => None,
                }
            };

            match task {
                Some(task) => {
                    task();
                    active.fetch_sub(1, Ordering::SeqCst);
                }
                None => {
                    std::thread::sleep(Duration::from_micros(64));
                    std::thread::yield_now();
                }
            }
        }

        trace!("worker loop stopped");
    }

    pub fn schedule(&self, task: Task) {
        self.queue.lock().unwrap().push_back(task);
    }

    /// Nothing queued and nothing running.
    pub fn is_idle(&self) -> bool {
        let queue_empty = self.queue.lock().unwrap().is_empty();
        queue_empty && self.active.load(Ordering::SeqCst) == 0
    }

    pub fn wait_idle(&self) {
        while !self.is_idle() {
            std::thread::yield_now();
        }
    }

    /// Drain the queue, then signal stop and join every worker.
    pub fn shutdown(mut self) {
        self.wait_idle();
        self.stop.store(true, Ordering::SeqCst);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Routes each message either to the pool or inline, preserving the total
/// order of serialized handlers.
pub struct Scheduler {
    context: Arc<Context>,
    pool: Option<ThreadPool>,
}

impl Scheduler {
    pub fn new(context: Arc<Context>) -> Self {
        Self { context, pool: None }
    }

    pub fn schedule(&mut self, message: Message) {
        if self.context.exit_requested() {
            trace!("Exit requested, ignoring message");
            return;
        }

        // The pool starts lazily on the first message.
        let pool = self.pool.get_or_insert_with(ThreadPool::start);

        if message.method().is_some_and(is_concurrent_safe) {
            trace!(
                "Scheduling \"{}\" on the worker pool",
                message.method().unwrap_or_default()
            );
            let context = self.context.clone();
            pool.schedule(Box::new(move || context.execute(&message)));
            return;
        }

        trace!(
            "Executing \"{}\" serialized",
            message.method().unwrap_or_default()
        );

        // Serialized handlers must observe the cumulative effect of every
        // concurrent handler scheduled before them.
        pool.wait_idle();
        self.context.execute(&message);
    }

    pub fn is_exit_requested(&self) -> bool {
        self.context.exit_requested()
    }

    pub fn shutdown(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::context::test_support::test_context;
    use crate::lsp::protocol::NotificationMessage;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_allowlist() {
        assert!(is_concurrent_safe("$/setTrace"));
        assert!(is_concurrent_safe("textDocument/completion"));
        assert!(!is_concurrent_safe("textDocument/didChange"));
        assert!(!is_concurrent_safe("initialize"));
        assert!(!is_concurrent_safe("exit"));
    }

    #[test]
    fn test_pool_runs_tasks_and_drains() {
        let pool = ThreadPool::start();
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..64 {
            let counter = counter.clone();
            pool.schedule(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        pool.wait_idle();
        assert_eq!(counter.load(Ordering::SeqCst), 64);
        pool.shutdown();
    }

    #[test]
    fn test_wait_idle_covers_running_tasks() {
        let pool = ThreadPool::start();
        let done = Arc::new(AtomicBool::new(false));

        {
            let done = done.clone();
            pool.schedule(Box::new(move || {
                std::thread::sleep(Duration::from_millis(50));
                done.store(true, Ordering::SeqCst);
            }));
        }

        pool.wait_idle();
        assert!(done.load(Ordering::SeqCst));
        pool.shutdown();
    }

    #[test]
    fn test_serialized_messages_see_prior_concurrent_effects() {
        let (context, _buffer) = test_context();
        context.set_initialized();
        let mut scheduler = Scheduler::new(context.clone());

        // Concurrent-safe trace update followed by a serialized open: the
        // serialized handler runs only after the pool drained.
        scheduler.schedule(Message::Notification(NotificationMessage {
            method: "$/setTrace".to_string(),
            params: json!({ "value": "verbose" }),
        }));
        scheduler.schedule(Message::Notification(NotificationMessage {
            method: "textDocument/didOpen".to_string(),
            params: json!({ "textDocument": { "uri": "u", "version": 1, "text": "x" } }),
        }));

        assert_eq!(context.trace_level(), crate::lsp::context::TraceLevel::Verbose);
        assert!(context.documents().get("u").is_some());

        scheduler.shutdown();
    }

    #[test]
    fn test_messages_ignored_after_exit() {
        let (context, _buffer) = test_context();
        context.set_initialized();
        let mut scheduler = Scheduler::new(context.clone());

        scheduler.schedule(Message::Notification(NotificationMessage {
            method: "exit".to_string(),
            params: serde_json::Value::Null,
        }));
        assert!(scheduler.is_exit_requested());

        scheduler.schedule(Message::Notification(NotificationMessage {
            method: "textDocument/didOpen".to_string(),
            params: json!({ "textDocument": { "uri": "u", "version": 1, "text": "x" } }),
        }));
        assert!(context.documents().get("u").is_none());

        scheduler.shutdown();
    }
}
