//! For tracking conversion progress and aborting early

use pbr::ProgressBar;
use std::io::Write;

/// A trait that is used to report progress to some consumer.
pub trait ProgressReporter: Send {
    /// Called once the number of frames to write is known
    fn set_total(&mut self, _frames: u64) {}

    /// Called after each frame has been written.
    ///
    /// This method may return `false` to abort processing.
    fn increase(&mut self) -> bool;

    /// Called when the conversion is complete
    fn done(&mut self, _msg: &str) {}
}

/// No-op progress reporter
pub struct NoProgress {}

impl ProgressReporter for NoProgress {
    fn increase(&mut self) -> bool {
        true
    }
}

/// Implement the progress reporter trait for a progress bar,
/// to make it usable for frame processing reporting.
impl<T> ProgressReporter for ProgressBar<T> where T: Write + Send {
    fn set_total(&mut self, frames: u64) {
        self.total = frames;
    }

    fn increase(&mut self) -> bool {
        self.inc();
        true
    }

    fn done(&mut self, msg: &str) {
        self.finish_print(msg);
    }
}
