use parking_lot::Mutex;
use tokio::{
    task::{self, JoinHandle},
    time,
};

/// Coalesces bursts of scheduled work into a single execution once no new
/// work has been scheduled for `interval`.
///
/// Only the most recently scheduled work runs, on tokio's blocking pool. Must
/// be used from within a tokio runtime.
#[derive(Debug)]
pub struct Debounce {
    interval: time::Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debounce {
    pub fn new(interval: time::Duration) -> Self {
        Self {
            interval,
            pending: Mutex::new(None),
        }
    }

    /// Cancels any pending work and arms the timer for `work`.
    pub fn schedule<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if let Some(task) = pending.take() {
            task.abort();
        }
        let interval = self.interval;
        *pending = Some(tokio::spawn(async move {
            time::sleep(interval).await;
            if let Err(error) = task::spawn_blocking(work).await {
                tracing::error!(%error, "Debounced work failed");
            }
        }));
    }
}

impl Drop for Debounce {
    fn drop(&mut self) {
        if let Some(task) = self.pending.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[tokio::test(start_paused = true)]
    async fn collapses_bursts_to_last_work() {
        let debounce = Debounce::new(time::Duration::from_secs(10));
        let runs = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicUsize::new(0));

        for i in 1..=5 {
            let runs = runs.clone();
            let last = last.clone();
            debounce.schedule(move || {
                runs.fetch_add(1, Ordering::SeqCst);
                last.store(i, Ordering::SeqCst);
            });
            time::sleep(time::Duration::from_secs(1)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0, "timer must not fire early");

        time::sleep(time::Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_periods_run_separately() {
        let debounce = Debounce::new(time::Duration::from_millis(100));
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let runs = runs.clone();
            debounce.schedule(move || {
                runs.fetch_add(1, Ordering::SeqCst);
            });
            time::sleep(time::Duration::from_millis(150)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn work_runs_off_the_async_worker() {
        let debounce = Debounce::new(time::Duration::from_millis(100));
        let (tx, rx) = tokio::sync::oneshot::channel();
        let caller = std::thread::current().id();
        debounce.schedule(move || {
            let _ = tx.send(std::thread::current().id());
        });
        let worker = rx.await.expect("work must run");
        assert_ne!(worker, caller);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_pending() {
        let runs = Arc::new(AtomicUsize::new(0));
        {
            let debounce = Debounce::new(time::Duration::from_millis(100));
            let runs = runs.clone();
            debounce.schedule(move || {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }
        time::sleep(time::Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
