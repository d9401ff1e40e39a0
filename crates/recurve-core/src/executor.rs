use crate::thread_pool::{ThreadPool, WaitGroup};
use recurve_error::{RecurveResult, recurve_err};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Where kernel work runs: inline on the calling thread, or fanned out over
/// an owned worker pool. Engines take an `&Executor` at construction so the
/// same pool can be shared by several operators without any global state.
pub enum Executor {
    Serial,
    WorkerPool(ThreadPool),
}

impl Executor {
    pub fn serial() -> Self {
        Executor::Serial
    }

    pub fn worker_pool(num_workers: usize) -> Self {
        Executor::WorkerPool(ThreadPool::new(num_workers))
    }

    pub fn num_workers(&self) -> usize {
        match self {
            Executor::Serial => 1,
            Executor::WorkerPool(pool) => pool.num_workers(),
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, Executor::WorkerPool(_))
    }

    /// Split `[0, count)` into stripes of `stripe` indices and run `task`
    /// over each `[start, end)` range, in parallel when a pool is attached.
    ///
    /// Stripes run as owned `'static` pool jobs, so the task must not
    /// capture plain borrows; buffers that live in the dispatching frame
    /// cross over as copyable erased views ([crate::SharedTile] /
    /// [crate::SharedSlice]), whose contract is that this dispatch joins
    /// every worker before returning.
    ///
    /// All stripes complete before this returns. Stripes run in no
    /// particular order. The first stripe error is returned (remaining
    /// stripes still run to completion); a stripe that panics is reported
    /// as an `Internal` error at the join.
    pub fn dispatch_stripes<F>(&self, count: usize, stripe: usize, task: F) -> RecurveResult<()>
    where
        F: Fn(usize, usize) -> RecurveResult<()> + Send + Sync + 'static,
    {
        if count == 0 {
            return Ok(());
        }

        let stripe = stripe.max(1);

        match self {
            Executor::Serial => {
                let mut start = 0;
                while start < count {
                    let end = (start + stripe).min(count);
                    task(start, end)?;
                    start = end;
                }

                Ok(())
            }
            Executor::WorkerPool(pool) => {
                let task = Arc::new(task);
                let wg = WaitGroup::new();
                let mut handles = Vec::new();
                let mut start = 0;

                while start < count {
                    let end = (start + stripe).min(count);
                    let task = Arc::clone(&task);
                    let guard = wg.guard();

                    handles.push(pool.submit_with_result(move || {
                        let result = catch_unwind(AssertUnwindSafe(|| task(start, end)));
                        drop(guard);

                        result.unwrap_or_else(|_| {
                            Err(recurve_err!(Internal: "worker panicked in stripe [{}, {})", start, end))
                        })
                    }));

                    start = end;
                }

                wg.wait();

                let mut first_err = None;
                for handle in handles {
                    match handle.join() {
                        Some(Ok(())) => {}
                        Some(Err(err)) => {
                            if first_err.is_none() {
                                first_err = Some(err);
                            }
                        }
                        None => {
                            if first_err.is_none() {
                                first_err = Some(
                                    recurve_err!(ThreadPool: "worker exited before reporting a stripe result"),
                                );
                            }
                        }
                    }
                }

                match first_err {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recurve_error::ErrorCode;
    use std::sync::Mutex;

    fn covered_ranges(executor: &Executor, count: usize, stripe: usize) -> Vec<(usize, usize)> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        executor
            .dispatch_stripes(count, stripe, move |start, end| {
                sink.lock().unwrap().push((start, end));
                Ok(())
            })
            .unwrap();

        let mut ranges = seen.lock().unwrap().clone();
        ranges.sort();
        ranges
    }

    #[test]
    fn stripes_cover_the_full_range_exactly_once() {
        for executor in [Executor::serial(), Executor::worker_pool(4)] {
            assert_eq!(
                covered_ranges(&executor, 10, 4),
                vec![(0, 4), (4, 8), (8, 10)]
            );
            assert_eq!(covered_ranges(&executor, 3, 8), vec![(0, 3)]);
            assert_eq!(covered_ranges(&executor, 0, 4), vec![]);
        }
    }

    #[test]
    fn zero_stripe_size_is_clamped() {
        let executor = Executor::serial();
        assert_eq!(covered_ranges(&executor, 2, 0), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn first_task_error_is_surfaced() {
        let executor = Executor::worker_pool(2);
        let err = executor
            .dispatch_stripes(8, 2, |start, _end| {
                if start >= 4 {
                    Err(recurve_err!(InvalidArgument: "stripe {} rejected", start))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn worker_panic_becomes_internal_error() {
        let executor = Executor::worker_pool(2);
        let err = executor
            .dispatch_stripes(4, 1, |start, _end| {
                if start == 2 {
                    panic!("boom");
                }
                Ok(())
            })
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::Internal);
    }

    #[test]
    fn stripes_write_in_frame_buffers_through_shared_tiles() {
        let executor = Executor::worker_pool(4);
        let mut buffer = vec![0usize; 64];
        let tile = crate::SharedTile::new(&mut buffer);

        executor
            .dispatch_stripes(64, 16, move |start, end| {
                let chunk = unsafe { tile.slice_mut(start, end - start) };
                for (offset, value) in chunk.iter_mut().enumerate() {
                    *value = start + offset;
                }
                Ok(())
            })
            .unwrap();

        for (index, value) in buffer.iter().enumerate() {
            assert_eq!(*value, index);
        }
    }
}
