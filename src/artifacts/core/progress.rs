//! Capabilities handed to long running operations by their caller
//!
//! The core never owns a UI. It reports incremental progress to a
//! [`ProgressSink`] and writes human readable staging lines to a [`LogSink`];
//! both are implemented by whoever drives the operation.

use std::cell::RefCell;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Progress and cooperative cancellation.
///
/// Operations call `start(total)` once, `update(completed)` as work is done and
/// `end()` when finished (also on failure). `is_cancelled()` is polled between
/// units of work; once it returns true the operation aborts cleanly.
pub trait ProgressSink {
    fn start(&self, total: usize);

    fn update(&self, completed: usize);

    fn end(&self);

    fn is_cancelled(&self) -> bool;
}

/// Sink that ignores progress and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&self, _total: usize) {}

    fn update(&self, _completed: usize) {}

    fn end(&self) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shareable cancellation flag that traces progress.
///
/// Clones share the same flag, so one clone can be handed to the running
/// operation while another is kept by the canceller (a signal handler, a UI
/// stop button).
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
    total: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

impl ProgressSink for CancelFlag {
    fn start(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        tracing::debug!(total, "progress started");
    }

    fn update(&self, completed: usize) {
        self.completed.store(completed, Ordering::SeqCst);
        tracing::trace!(completed, total = self.total(), "progress");
    }

    fn end(&self) {
        tracing::debug!(completed = self.completed(), "progress finished");
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Receiver of formatted staging lines (`A path`, `D path`, `R old -> new`).
///
/// Logging is best effort: a sink that fails to write must swallow the error.
pub trait LogSink {
    fn log(&self, line: &str);
}

impl<W: Write> LogSink for RefCell<W> {
    fn log(&self, line: &str) {
        if let Ok(mut writer) = self.try_borrow_mut() {
            let _ = writeln!(writer, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_clones_share_state() {
        let flag = CancelFlag::new();
        let handle = flag.clone();

        flag.start(4);
        flag.update(2);
        assert!(!flag.is_cancelled());

        handle.cancel();

        assert!(flag.is_cancelled());
        pretty_assertions::assert_eq!(handle.completed(), 2);
        pretty_assertions::assert_eq!(handle.total(), 4);
    }

    #[test]
    fn log_sink_writes_one_line_per_call() {
        let sink = RefCell::new(Vec::<u8>::new());

        sink.log("A a.txt");
        sink.log("D b.txt");

        pretty_assertions::assert_eq!(
            String::from_utf8(sink.into_inner()).unwrap(),
            "A a.txt\nD b.txt\n"
        );
    }

    #[test]
    fn log_sink_ignores_a_busy_writer() {
        let sink = RefCell::new(Vec::<u8>::new());
        let _guard = sink.borrow_mut();

        sink.log("A a.txt");
    }
}
