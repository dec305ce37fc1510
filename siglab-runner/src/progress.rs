//! Progress reporting for batch loops.
//!
//! Callers inject the reporter; nothing here inspects the environment.

/// Progress callback for sequential batches (simulation units, stored records).
pub trait Progress {
    /// Called before item `index` (zero-based) of `total` is processed.
    fn on_item(&self, label: &str, index: usize, total: usize);

    /// Called once the whole batch is done.
    fn on_done(&self, total: usize) {
        let _ = total;
    }
}

/// Prints one line per item to stdout.
pub struct StdoutProgress;

impl Progress for StdoutProgress {
    fn on_item(&self, label: &str, index: usize, total: usize) {
        println!("[{}/{}] {label}", index + 1, total);
    }

    fn on_done(&self, total: usize) {
        println!("done: {total} item(s)");
    }
}

/// Reports nothing.
pub struct SilentProgress;

impl Progress for SilentProgress {
    fn on_item(&self, _label: &str, _index: usize, _total: usize) {}
}
