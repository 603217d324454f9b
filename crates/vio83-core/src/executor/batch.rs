//! Batch Processor
//!
//! An unbounded feed draining through a bounded internal buffer: `put`
//! blocks when the buffer is full, which is the backpressure. `process_all`
//! drains the buffer into fixed-size batches and runs the batch function
//! over a thread pool.

use crossbeam_channel::{bounded, Receiver, Sender};

use super::pool::ThreadPool;
use super::ProgressTracker;

/// Bounded-buffer batch processor.
pub struct BatchProcessor<T> {
    sender: Option<Sender<T>>,
    receiver: Receiver<T>,
    batch_size: usize,
}

impl<T: Send + Sync> BatchProcessor<T> {
    /// Processor with an internal buffer of `buffer_capacity` items,
    /// draining in batches of `batch_size`.
    pub fn new(buffer_capacity: usize, batch_size: usize) -> Self {
        let (sender, receiver) = bounded(buffer_capacity.max(1));
        Self {
            sender: Some(sender),
            receiver,
            batch_size: batch_size.max(1),
        }
    }

    /// Feed one item. Blocks while the buffer is full.
    pub fn put(&self, item: T) -> bool {
        match &self.sender {
            Some(sender) => sender.send(item).is_ok(),
            None => false,
        }
    }

    /// A clone of the feed side, for producer threads.
    pub fn feeder(&self) -> Option<Sender<T>> {
        self.sender.clone()
    }

    /// Close the feed; `process_all` returns once the buffer drains.
    pub fn close(&mut self) {
        self.sender = None;
    }

    /// Drain everything into batches and run `process_fn` over each batch
    /// on a thread pool. Returns the number of batches processed.
    pub fn process_all<F>(mut self, process_fn: F, max_workers: Option<usize>) -> usize
    where
        F: Fn(&[T]) + Send + Sync,
    {
        self.close();

        let mut batches: Vec<Vec<T>> = Vec::new();
        let mut current: Vec<T> = Vec::with_capacity(self.batch_size);
        while let Ok(item) = self.receiver.recv() {
            current.push(item);
            if current.len() >= self.batch_size {
                batches.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            batches.push(current);
        }

        if batches.is_empty() {
            return 0;
        }

        let pool = ThreadPool::new(max_workers);
        let tracker = ProgressTracker::new(batches.len());
        let processed = pool.map(
            |batch: &Vec<T>| {
                process_fn(batch);
                Ok::<(), String>(())
            },
            &batches,
            Some(&tracker),
            0,
        );
        processed.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================
