pub mod change_feed;
pub mod memory;
pub mod models;
pub mod pg;
pub mod schema;


use thiserror::Error;

use crate::model::{NewReport, Report, ReportId};
use change_feed::Subscription;


#[derive(Debug, Error)]
pub enum BackendError {
    #[error("database query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("database connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),
    #[error("backing store unavailable: {0}")]
    Unavailable(String),
}

pub type BackendResult<T> = Result<T, BackendError>;


/// The shared store every client reads from and writes to.
pub trait ReportBackend: Send + Sync {
    /// Every report, newest first.
    fn select_all(&self) -> BackendResult<Vec<Report>>;

    /// Persists the record; the store assigns id and creation time.
    fn insert(&self, report: &NewReport) -> BackendResult<Report>;

    /// Number of rows removed.
    fn delete(&self, id: ReportId) -> BackendResult<usize>;

    /// Signals on insert, update or delete. Which writers an adapter hears
    /// is up to the adapter.
    fn subscribe(&self) -> BackendResult<Subscription>;
}


pub fn sort_newest_first(reports: &mut Vec<Report>) {
    reports.sort_by(|a, b| {
        b.created_time.cmp(&a.created_time)
            .then_with(|| b.id.cmp(&a.id))
    });
}
