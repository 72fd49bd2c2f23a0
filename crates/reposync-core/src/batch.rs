use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use tracing::debug;

/// Run-scoped cooperative cancellation. Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

enum BatchEvent<O> {
    Started(usize),
    Finished(usize, O),
}

/// Drives a worker over a list of items, checking the cancel flag before each item.
///
/// With a concurrency of one the items run in input order on the calling thread.
/// Larger values run a bounded pool of scoped threads; callbacks still fire on the
/// calling thread, in completion order.
#[derive(Clone, Debug)]
pub struct BatchExecutor {
    concurrency: usize,
    cancel: CancelFlag,
}

impl BatchExecutor {
    pub fn sequential(cancel: CancelFlag) -> Self {
        Self::with_concurrency(1, cancel)
    }

    pub fn with_concurrency(concurrency: usize, cancel: CancelFlag) -> Self {
        Self {
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Returns `(input index, outcome)` pairs in completion order. After cancellation
    /// the list holds only the items that had already started.
    pub fn execute<T, O, W, P, D>(
        &self,
        items: &[T],
        worker: W,
        mut on_progress: P,
        mut on_item_done: D,
    ) -> Vec<(usize, O)>
    where
        T: Sync,
        O: Send,
        W: Fn(&T) -> O + Sync,
        P: FnMut(usize, usize, &T),
        D: FnMut(usize, &O),
    {
        let total = items.len();
        if self.concurrency <= 1 || total <= 1 {
            return self.execute_serial(items, worker, &mut on_progress, &mut on_item_done);
        }

        let workers = self.concurrency.min(total);
        let next = Mutex::new(0usize);
        let mut results = Vec::with_capacity(total);
        let (tx, rx) = mpsc::channel::<BatchEvent<O>>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let worker = &worker;
                let cancel = &self.cancel;
                scope.spawn(move || {
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let index = {
                            let mut guard = next.lock().unwrap_or_else(PoisonError::into_inner);
                            if *guard >= total {
                                break;
                            }
                            let index = *guard;
                            *guard += 1;
                            index
                        };
                        let _ = tx.send(BatchEvent::Started(index));
                        let outcome = worker(&items[index]);
                        let _ = tx.send(BatchEvent::Finished(index, outcome));
                    }
                });
            }
            drop(tx);

            while let Ok(event) = rx.recv() {
                match event {
                    BatchEvent::Started(index) => on_progress(index, total, &items[index]),
                    BatchEvent::Finished(index, outcome) => {
                        on_item_done(index, &outcome);
                        results.push((index, outcome));
                    }
                }
            }
        });

        if results.len() < total {
            debug!(completed = results.len(), total, "batch stopped early");
        }
        results
    }

    fn execute_serial<T, O, W, P, D>(
        &self,
        items: &[T],
        worker: W,
        on_progress: &mut P,
        on_item_done: &mut D,
    ) -> Vec<(usize, O)>
    where
        W: Fn(&T) -> O,
        P: FnMut(usize, usize, &T),
        D: FnMut(usize, &O),
    {
        let total = items.len();
        let mut results = Vec::with_capacity(total);
        for (index, item) in items.iter().enumerate() {
            if self.cancel.is_cancelled() {
                debug!(completed = results.len(), total, "batch cancelled");
                break;
            }
            on_progress(index, total, item);
            let outcome = worker(item);
            on_item_done(index, &outcome);
            results.push((index, outcome));
        }
        results
    }
}
