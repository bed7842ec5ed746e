use std::{collections::VecDeque, future::Future};

use futures_util::stream::{FuturesUnordered, StreamExt};

/// FIFO of pending work driven on the calling task with at most
/// `concurrency` items in flight. Each finished item may enqueue more.
#[derive(Debug)]
pub struct WorkQueue<T> {
    pending: VecDeque<T>,
    concurrency: usize,
}

impl<T> WorkQueue<T> {
    pub fn new(concurrency: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn push(&mut self, item: T) {
        self.pending.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Runs `worker` over every item, including those it returns, until
    /// nothing is pending or in flight. Returns the number of items processed.
    pub async fn drain<F, Fut>(&mut self, mut worker: F) -> usize
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Vec<T>>,
    {
        let mut in_flight = FuturesUnordered::new();
        let mut processed = 0;

        loop {
            while in_flight.len() < self.concurrency {
                match self.pending.pop_front() {
                    Some(item) => in_flight.push(worker(item)),
                    None => break,
                }
            }

            match in_flight.next().await {
                Some(follow_ups) => {
                    processed += 1;
                    self.pending.extend(follow_ups);
                }
                None => break,
            }
        }

        processed
    }
}

impl<T> Extend<T> for WorkQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.pending.extend(iter);
    }
}
