use std::{
    thread,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
        mpsc::RecvTimeoutError,
    },
    time::Duration,
};

use crate::db::{BackendResult, ReportBackend};
use crate::db::change_feed::Subscription;
use crate::report_sys::ReportStore;
use crate::task_scheduler::{Task, TaskSchedulerBuilder};


const RESYNC_RETRY_DELAY: Duration = Duration::from_secs(2);


/// Keeps a `ReportStore` converged with the backing store.
///
/// Any change signal triggers a full refetch that replaces the replica, so
/// out-of-order or partial notifications never matter. Failures leave the
/// last good collection in place and are only logged.
pub struct ReportSynchronizer {
    store: Arc<ReportStore>,
    backend: Arc<dyn ReportBackend>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ReportSynchronizer {
    pub fn new(store: Arc<ReportStore>, poll_interval: Duration) -> Self {
        let backend = store.backend().clone();

        ReportSynchronizer {
            store,
            backend,
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Subscribes, does a full fetch, then listens for change signals on a
    /// worker thread. A write landing between the two is either in the fetch
    /// or queued on the subscription.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let subscription = match self.backend.subscribe() {
            Ok(sub) => Some(sub),
            Err(err) => {
                warn!("Fail to subscribe to report changes: {}", err);
                None
            },
        };

        let _ = refetch(&self.backend, &self.store);

        let worker = FeedWorker {
            store: self.store.clone(),
            backend: self.backend.clone(),
            running: self.running.clone(),
            poll_interval: self.poll_interval,
        };

        *self.worker() = Some(thread::spawn(move || worker.run(subscription)));
        info!("Report synchronizer started");
    }

    /// Stops the worker, which releases its subscription on the way out.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(worker) = self.worker().take() {
            if worker.join().is_err() {
                error!("Report feed worker panicked");
            }
        }
        info!("Report synchronizer stopped");
    }

    /// One full fetch replacing the replica. Errors are logged, not raised.
    pub fn refetch(&self) -> bool {
        refetch(&self.backend, &self.store).is_ok()
    }

    /// Safety net against lost signals, run on the task scheduler.
    pub fn resync_job(&self, period: Duration) -> Duration {
        if !self.is_running() {
            return period;
        }

        if self.refetch() {
            period
        }
        else {
            RESYNC_RETRY_DELAY
        }
    }

    fn worker(&self) -> MutexGuard<Option<thread::JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ReportSynchronizer {
    fn drop(&mut self) {
        self.stop();
    }
}


pub fn init_report_sync(scheduler: &mut TaskSchedulerBuilder, sync: Arc<ReportSynchronizer>, period: Duration) {
    sync.start();

    scheduler.add_task(Task::new("report resync", move || {
        sync.resync_job(period)
    }, period));
}


struct FeedWorker {
    store: Arc<ReportStore>,
    backend: Arc<dyn ReportBackend>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl FeedWorker {
    fn run(self, mut subscription: Option<Subscription>) {
        while self.running.load(Ordering::SeqCst) {
            if subscription.is_none() {
                subscription = self.resubscribe();
            }

            let connected = match subscription {
                Some(ref sub) => self.pump(sub),
                None => {
                    thread::sleep(self.poll_interval);
                    true
                },
            };

            if !connected {
                warn!("Report change feed disconnected");
                subscription = None;
            }
        }

        if let Some(sub) = subscription {
            sub.unsubscribe();
        }
    }

    /// Waits one poll interval for a signal; false once the feed is gone.
    fn pump(&self, sub: &Subscription) -> bool {
        match sub.recv_timeout(self.poll_interval) {
            Ok(event) => {
                // Signals that piled up meanwhile are covered by this fetch.
                let coalesced = sub.drain();
                debug!("Change signal {:?} (+{} coalesced)", event, coalesced);
                let _ = refetch(&self.backend, &self.store);
                true
            },
            Err(RecvTimeoutError::Timeout) => true,
            Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn resubscribe(&self) -> Option<Subscription> {
        match self.backend.subscribe() {
            Ok(sub) => {
                info!("Resubscribed to report changes");
                // Anything written while we were away was never signalled.
                let _ = refetch(&self.backend, &self.store);
                Some(sub)
            },
            Err(err) => {
                debug!("Resubscribe failed: {}", err);
                None
            },
        }
    }
}


fn refetch(backend: &Arc<dyn ReportBackend>, store: &ReportStore) -> BackendResult<()> {
    match backend.select_all() {
        Ok(reports) => {
            debug!("Fetched {} reports", reports.len());
            store.replace_all(reports);
            Ok(())
        },
        Err(err) => {
            warn!("Fail to fetch reports: {}", err);
            Err(err)
        },
    }
}
