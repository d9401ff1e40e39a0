use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, mpsc};
use std::thread;

/// A fixed-size pool of OS worker threads. Workers are created once and
/// reused for every job submitted over the pool's lifetime; dropping the
/// pool joins them all.
///
/// The pool is a plain value - callers own it and pass it where it is
/// needed. There is deliberately no process-global instance.
pub struct ThreadPool {
    sender: mpsc::Sender<Message>,
    workers: Vec<Worker>,
}

impl ThreadPool {
    /// Create a pool with `size` workers. `size` is clamped to at least one.
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));

        ThreadPool {
            sender,
            workers: (0..size.max(1))
                .map(|id| Worker::new(id, Arc::clone(&receiver)))
                .collect(),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn is_alive(&self) -> bool {
        self.workers.iter().any(|worker| worker.is_alive())
    }

    /// Fire-and-forget job submission.
    pub fn submit<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let job = Box::new(f);
        self.sender.send(Message::Work(job)).unwrap();
    }

    /// Submit a job and get a [JobHandle] back. `JobHandle::join` blocks
    /// until the job has run and yields its return value.
    pub fn submit_with_result<F, T>(&self, f: F) -> JobHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let job = Box::new(move || {
            // The handle may have been dropped; a send failure is fine.
            let _ = tx.send(f());
        });

        self.sender.send(Message::Work(job)).unwrap();

        JobHandle { receiver: rx }
    }
}

/// Workers must all be told to terminate before they can be joined.
impl Drop for ThreadPool {
    fn drop(&mut self) {
        for _ in self.workers.iter() {
            self.sender.send(Message::Terminate).unwrap();
        }

        for worker in self.workers.iter_mut() {
            if let Some(thread) = worker.thread.take() {
                thread.join().unwrap();
            }
        }
    }
}

/// Blocking receiver for the result of a single submitted job.
pub struct JobHandle<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> JobHandle<T> {
    /// Wait for the job and return its value. Returns `None` when the
    /// worker died before producing one.
    pub fn join(self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Work(Job),
    Terminate,
}

struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Message>>>) -> Self {
        Worker {
            id,
            thread: Some(thread::spawn(move || {
                loop {
                    let message = match receiver.lock() {
                        Ok(guard) => guard.recv(),
                        Err(_) => break,
                    };

                    match message {
                        Ok(Message::Work(job)) => job(),
                        Ok(Message::Terminate) | Err(_) => break,
                    }
                }
            })),
        }
    }

    /// The thread handle is 'taken' on join, so `None` means gone.
    fn is_alive(&self) -> bool {
        self.thread.is_some()
    }
}

impl Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("is_alive", &self.is_alive())
            .finish()
    }
}

/// Counter-and-condvar barrier used to join a batch of pool jobs.
///
/// Every job holds a [WaitGuard]; the guard decrements the counter when
/// dropped and `wait` blocks until the counter reaches zero.
#[derive(Clone)]
pub struct WaitGroup {
    inner: Arc<Inner>,
}

struct Inner {
    counter: AtomicUsize,
    lock: Mutex<()>,
    cvar: Condvar,
}

pub struct WaitGuard {
    wg: WaitGroup,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        if self.wg.inner.counter.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.wg.inner.lock.lock().unwrap();
            self.wg.inner.cvar.notify_all();
        }
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitGroup {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                counter: AtomicUsize::new(0),
                lock: Mutex::new(()),
                cvar: Condvar::new(),
            }),
        }
    }

    pub fn guard(&self) -> WaitGuard {
        self.inner.counter.fetch_add(1, Ordering::AcqRel);
        WaitGuard { wg: self.clone() }
    }

    /// Blocks until every outstanding guard has been dropped.
    pub fn wait(&self) {
        if self.inner.counter.load(Ordering::Acquire) == 0 {
            return;
        }

        let lock = self.inner.lock.lock().unwrap();
        let _unused = self
            .inner
            .cvar
            .wait_while(lock, |_| self.inner.counter.load(Ordering::Acquire) != 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn pool_runs_submitted_jobs() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));

        let handles = (0..16)
            .map(|_| {
                let counter = Arc::clone(&counter);
                pool.submit_with_result(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn job_handle_returns_value() {
        let pool = ThreadPool::new(2);
        let handle = pool.submit_with_result(|| 10 + 32);
        assert_eq!(handle.join(), Some(42));
    }

    #[test]
    fn zero_size_pool_still_has_a_worker() {
        let pool = ThreadPool::new(0);
        assert_eq!(pool.num_workers(), 1);
        assert!(pool.is_alive());
    }

    #[test]
    fn wait_group_joins_all_jobs() {
        let pool = ThreadPool::new(4);
        let wg = WaitGroup::new();
        let total = Arc::new(AtomicUsize::new(0));
        let num_tasks = 10;

        for _ in 0..num_tasks {
            let guard = wg.guard();
            let total = Arc::clone(&total);
            pool.submit(move || {
                total.fetch_add(1, Ordering::SeqCst);
                drop(guard);
            });
        }

        wg.wait();
        assert_eq!(total.load(Ordering::SeqCst), num_tasks);
    }

    #[test]
    fn wait_group_with_no_guards_returns_immediately() {
        let wg = WaitGroup::new();
        wg.wait();
    }
}
