use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send>;

/// Handle to the sequential context on which application callbacks run.
///
/// Jobs run one at a time, in the order they were posted, whichever thread
/// posted them.
#[derive(Clone)]
pub struct MainContext {
    jobs: mpsc::UnboundedSender<Job>,
}

/// Receiving half of a [`MainContext`], driven by the application.
pub struct MainLoop {
    jobs: mpsc::UnboundedReceiver<Job>,
}

impl MainContext {
    /// Creates a context whose loop the caller drives through [`MainLoop`].
    pub fn channel() -> (MainContext, MainLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MainContext { jobs: tx }, MainLoop { jobs: rx })
    }

    /// Creates a context running on its own tokio task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn() -> MainContext {
        let (context, main_loop) = Self::channel();
        tokio::spawn(main_loop.run());
        context
    }

    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.jobs.send(Box::new(job)).is_err() {
            tracing::warn!("main context loop is gone; dropping callback");
        }
    }
}

impl MainLoop {
    /// Runs jobs until every [`MainContext`] handle has been dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.jobs.recv().await {
            job();
        }
    }

    /// Runs every job already queued without waiting. Returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.jobs.try_recv() {
            job();
            ran += 1;
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_drain_runs_jobs_in_post_order() {
        let (context, mut main_loop) = MainContext::channel();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let seen = seen.clone();
            context.post(move || seen.lock().push(i));
        }

        assert!(seen.lock().is_empty());
        assert_eq!(main_loop.drain(), 5);
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(main_loop.drain(), 0);
    }

    #[test]
    fn test_post_after_loop_dropped_is_ignored() {
        let (context, main_loop) = MainContext::channel();
        drop(main_loop);
        context.post(|| panic!("must not run"));
    }

    #[tokio::test]
    async fn test_spawned_context_runs_jobs() {
        let context = MainContext::spawn();
        let (tx, rx) = tokio::sync::oneshot::channel();
        context.post(move || {
            let _ = tx.send(42);
        });
        assert_eq!(rx.await.unwrap(), 42);
    }
}
