use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use chrono::Utc;

use super::{sort_newest_first, BackendError, BackendResult, ReportBackend};
use super::change_feed::{ChangeEvent, ChangeHub, Subscription};
use crate::model::{NewReport, Report, ReportId};


/// In-process store for development runs and tests.
pub struct MemoryBackend {
    rows: Mutex<Rows>,
    hub: Arc<ChangeHub>,
    reads_down: AtomicBool,
    writes_down: AtomicBool,
    feed_down: AtomicBool,
}

struct Rows {
    reports: Vec<Report>,
    next_id: ReportId,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::with_reports(Vec::new())
    }

    pub fn with_reports(mut reports: Vec<Report>) -> Self {
        sort_newest_first(&mut reports);
        let next_id = reports.iter().map(|r| r.id).max().unwrap_or(0) + 1;

        MemoryBackend {
            rows: Mutex::new(Rows { reports, next_id }),
            hub: ChangeHub::new(),
            reads_down: AtomicBool::new(false),
            writes_down: AtomicBool::new(false),
            feed_down: AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    pub fn set_reads_down(&self, down: bool) {
        self.reads_down.store(down, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn set_writes_down(&self, down: bool) {
        self.writes_down.store(down, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn set_feed_down(&self, down: bool) {
        self.feed_down.store(down, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    /// Writes a record and signals the feed, as another client would.
    #[cfg(test)]
    pub fn insert_external(&self, report: Report) {
        let replaced = {
            let mut rows = self.rows();
            rows.next_id = rows.next_id.max(report.id + 1);
            let before = rows.reports.len();
            rows.reports.retain(|r| r.id != report.id);
            let replaced = rows.reports.len() < before;
            rows.reports.push(report);
            sort_newest_first(&mut rows.reports);
            replaced
        };

        if replaced {
            self.hub.publish(ChangeEvent::Update);
        }
        else {
            self.hub.publish(ChangeEvent::Insert);
        }
    }

    fn rows(&self) -> MutexGuard<Rows> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(flag: &AtomicBool, what: &str) -> BackendResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(BackendError::Unavailable(format!("{} rejected", what)))
        }
        else {
            Ok(())
        }
    }
}

impl ReportBackend for MemoryBackend {
    fn select_all(&self) -> BackendResult<Vec<Report>> {
        MemoryBackend::check(&self.reads_down, "select")?;
        Ok(self.rows().reports.clone())
    }

    fn insert(&self, report: &NewReport) -> BackendResult<Report> {
        MemoryBackend::check(&self.writes_down, "insert")?;

        let created = {
            let mut rows = self.rows();
            let id = rows.next_id;
            rows.next_id += 1;

            let created = report.clone().into_report(id, Utc::now());
            rows.reports.push(created.clone());
            sort_newest_first(&mut rows.reports);
            created
        };

        self.hub.publish(ChangeEvent::Insert);
        Ok(created)
    }

    fn delete(&self, id: ReportId) -> BackendResult<usize> {
        MemoryBackend::check(&self.writes_down, "delete")?;

        let cnt = {
            let mut rows = self.rows();
            let before = rows.reports.len();
            rows.reports.retain(|r| r.id != id);
            before - rows.reports.len()
        };

        if cnt > 0 {
            self.hub.publish(ChangeEvent::Delete);
        }
        Ok(cnt)
    }

    fn subscribe(&self) -> BackendResult<Subscription> {
        MemoryBackend::check(&self.feed_down, "subscribe")?;
        Ok(self.hub.subscribe())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{draft, sample_report};

    #[test]
    fn select_is_newest_first() {
        let backend = MemoryBackend::with_reports(vec![
            sample_report(1, "Gulshan", 0),
            sample_report(2, "Banani", 10),
            sample_report(3, "Mirpur", 5),
        ]);

        let ids = backend.select_all().unwrap().iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn insert_assigns_fresh_id_and_signals() {
        let backend = MemoryBackend::with_reports(vec![sample_report(7, "Gulshan", 0)]);
        let sub = backend.subscribe().unwrap();

        let new = draft("Phone snatched", "Theft", "Uttara").into_new_report().unwrap();
        let created = backend.insert(&new).unwrap();

        assert_eq!(created.id, 8);
        assert_eq!(sub.try_recv(), Ok(ChangeEvent::Insert));
    }

    #[test]
    fn deleting_missing_row_is_silent() {
        let backend = MemoryBackend::new();
        let sub = backend.subscribe().unwrap();

        assert_eq!(backend.delete(42).unwrap(), 0);
        assert!(sub.try_recv().is_err());
    }

    #[test]
    fn outages_reject_calls() {
        let backend = MemoryBackend::new();
        backend.set_reads_down(true);
        backend.set_feed_down(true);

        assert!(backend.select_all().is_err());
        assert!(backend.subscribe().is_err());
    }

    #[test]
    fn external_rewrite_signals_update() {
        let backend = MemoryBackend::with_reports(vec![sample_report(3, "Gulshan", 0)]);
        let sub = backend.subscribe().unwrap();

        backend.insert_external(sample_report(3, "Banani", 0));
        backend.insert_external(sample_report(4, "Mirpur", 1));

        assert_eq!(sub.try_recv(), Ok(ChangeEvent::Update));
        assert_eq!(sub.try_recv(), Ok(ChangeEvent::Insert));
        assert_eq!(backend.select_all().unwrap().len(), 2);
    }
}
