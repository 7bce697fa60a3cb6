//! Bounded worker pool: the concurrency primitives shared by the
//! detection and registration stages (§4.7, §5).
//!
//! Three pieces of shared state cross worker threads: a monotone
//! next-frame-index counter (`WorkQueue`), the ordered, append-with-gap-fill
//! detection table (`DetectionTable`), and a single user-abort flag. Workers
//! claim an index, process it, and on error record the *first* such error;
//! every worker runs to natural completion (it keeps claiming and
//! processing further indices) rather than being killed outright, matching
//! §7's propagation policy. A user abort (`AbortFlag::abort_by_user`) takes
//! priority over any processing error in the surfaced result.

use std::sync::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{LuckyError, Result};
use crate::frame::Star;

/// A single shared "claim the next index" counter, bounded by `limit`
/// (e.g. `total_frames * frame_percentage / 100`).
pub struct WorkQueue {
    next: AtomicUsize,
    limit: usize,
}

impl WorkQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            next: AtomicUsize::new(0),
            limit,
        }
    }

    /// Atomically claim the next index, or `None` once `limit` is reached.
    pub fn claim(&self) -> Option<usize> {
        let idx = self.next.fetch_add(1, Ordering::SeqCst);
        if idx < self.limit {
            Some(idx)
        } else {
            None
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Cancellation signal. `set_error` marks an internal processing failure;
/// `set_user_abort` marks an explicit user interrupt (e.g. Ctrl-C), which
/// takes priority when the driver decides which error to surface. Either
/// kind wakes any thread blocked in [`DetectionTable::wait_for`].
#[derive(Default)]
pub struct AbortFlag {
    stop: AtomicBool,
    user_abort: AtomicBool,
}

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_user_abort(&self) {
        self.user_abort.store(true, Ordering::SeqCst);
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn set_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn is_user_abort(&self) -> bool {
        self.user_abort.load(Ordering::SeqCst)
    }
}

/// The ordered, per-frame star-list table shared by detection workers.
/// `detections[i]` is written exactly once; frame *i*'s worker blocks in
/// [`DetectionTable::wait_for`] `(i - 1)` until that write lands.
pub struct DetectionTable {
    inner: Mutex<Vec<Option<Vec<Star>>>>,
    cond: Condvar,
}

impl DetectionTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
            cond: Condvar::new(),
        }
    }

    /// Publish the star list for `index`, growing the table if needed, and
    /// wake every waiter.
    pub fn set(&self, index: usize, stars: Vec<Star>) {
        let mut guard = self.inner.lock().expect("detection table poisoned");
        if guard.len() <= index {
            guard.resize_with(index + 1, || None);
        }
        guard[index] = Some(stars);
        self.cond.notify_all();
    }

    /// Block until `detections[index]` is present, or until `abort` is
    /// signalled (in which case `None` is returned).
    pub fn wait_for(&self, index: usize, abort: &AbortFlag) -> Option<Vec<Star>> {
        let mut guard = self.inner.lock().expect("detection table poisoned");
        loop {
            if let Some(Some(stars)) = guard.get(index) {
                return Some(stars.clone());
            }
            if abort.is_stopped() {
                return None;
            }
            let (next_guard, timeout) = self
                .cond
                .wait_timeout(guard, std::time::Duration::from_millis(50))
                .expect("detection table poisoned");
            guard = next_guard;
            let _ = timeout;
        }
    }

    pub fn get(&self, index: usize) -> Option<Vec<Star>> {
        self.inner
            .lock()
            .expect("detection table poisoned")
            .get(index)
            .cloned()
            .flatten()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("detection table poisoned").len()
    }

    pub fn into_inner(self) -> Vec<Vec<Star>> {
        self.inner
            .into_inner()
            .expect("detection table poisoned")
            .into_iter()
            .map(|slot| slot.unwrap_or_default())
            .collect()
    }
}

impl Default for DetectionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress callbacks for a single pipeline stage. All methods default to
/// no-ops; implementors drive a UI progress bar or structured log.
pub trait ProgressReporter: Send + Sync {
    fn begin_stage(&self, _stage: &str, _total_items: Option<usize>) {}
    fn advance(&self, _items_done: usize) {}
    fn finish_stage(&self) {}
}

pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Run `worker_count` threads, each repeatedly claiming the next index
/// from `queue` and calling `process(idx)`, until the queue is exhausted
/// or `abort` is signalled. Every worker runs to completion of its current
/// item before checking `abort` again; the first `Err` any worker returns
/// is recorded and becomes the result, unless a user abort was signalled,
/// which always takes priority.
pub fn run_workers<F>(
    worker_count: usize,
    queue: &WorkQueue,
    abort: &AbortFlag,
    reporter: &dyn ProgressReporter,
    process: F,
) -> Result<()>
where
    F: Fn(usize) -> Result<()> + Send + Sync,
{
    let first_error: Mutex<Option<LuckyError>> = Mutex::new(None);
    let worker_count = worker_count.max(1);

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            scope.spawn(|| loop {
                if abort.is_stopped() {
                    return;
                }
                let Some(idx) = queue.claim() else {
                    return;
                };
                match process(idx) {
                    Ok(()) => reporter.advance(idx + 1),
                    Err(e) => {
                        let is_abort = matches!(e, LuckyError::Abort);
                        let mut guard = first_error.lock().expect("error slot poisoned");
                        if guard.is_none() {
                            *guard = Some(e);
                        }
                        drop(guard);
                        if is_abort {
                            abort.set_stop();
                        }
                    }
                }
            });
        }
    });

    if abort.is_user_abort() {
        return Err(LuckyError::Abort);
    }
    if let Some(err) = first_error.into_inner().expect("error slot poisoned") {
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_queue_hands_out_each_index_once() {
        let queue = WorkQueue::new(5);
        let mut seen = Vec::new();
        while let Some(i) = queue.claim() {
            seen.push(i);
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn detection_table_wait_observes_later_write() {
        use std::sync::Arc;

        let table = Arc::new(DetectionTable::new());
        let abort = Arc::new(AbortFlag::new());

        let t2 = table.clone();
        let a2 = abort.clone();
        let handle = std::thread::spawn(move || t2.wait_for(3, &a2));

        std::thread::sleep(std::time::Duration::from_millis(10));
        table.set(3, vec![]);

        let result = handle.join().unwrap();
        assert_eq!(result, Some(vec![]));
    }

    #[test]
    fn run_workers_surfaces_first_error() {
        let queue = WorkQueue::new(10);
        let abort = AbortFlag::new();
        let result = run_workers(4, &queue, &abort, &NoOpReporter, |idx| {
            if idx == 3 {
                Err(LuckyError::Internal("boom".into()))
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
    }

    #[test]
    fn run_workers_continues_past_non_abort_error() {
        let queue = WorkQueue::new(20);
        let abort = AbortFlag::new();
        let processed = Mutex::new(Vec::new());
        let result = run_workers(4, &queue, &abort, &NoOpReporter, |idx| {
            if idx == 3 {
                return Err(LuckyError::Internal("boom".into()));
            }
            processed.lock().unwrap().push(idx);
            Ok(())
        });
        assert!(result.is_err());
        assert!(!abort.is_user_abort());
        // every other index still got processed; only idx 3 is missing.
        let mut got = processed.into_inner().unwrap();
        got.sort();
        let mut expected: Vec<usize> = (0..20).collect();
        expected.retain(|&i| i != 3);
        assert_eq!(got, expected);
    }

    #[test]
    fn run_workers_stops_early_on_abort_error() {
        let queue = WorkQueue::new(1000);
        let abort = AbortFlag::new();
        let processed = Mutex::new(Vec::new());
        let result = run_workers(1, &queue, &abort, &NoOpReporter, |idx| {
            if idx == 3 {
                return Err(LuckyError::Abort);
            }
            processed.lock().unwrap().push(idx);
            Ok(())
        });
        assert!(matches!(result, Err(LuckyError::Abort)));
        let got = processed.into_inner().unwrap();
        assert_eq!(got, vec![0, 1, 2]);
    }

    #[test]
    fn run_workers_all_succeed() {
        let queue = WorkQueue::new(20);
        let abort = AbortFlag::new();
        let processed = Mutex::new(Vec::new());
        run_workers(4, &queue, &abort, &NoOpReporter, |idx| {
            processed.lock().unwrap().push(idx);
            Ok(())
        })
        .unwrap();
        let mut got = processed.into_inner().unwrap();
        got.sort();
        assert_eq!(got, (0..20).collect::<Vec<_>>());
    }
}
