use std::collections::HashSet;
use std::sync::{
    Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
    atomic::{AtomicU64, Ordering},
};

use thiserror::Error;

use crate::db::{sort_newest_first, BackendError, ReportBackend};
use crate::model::{Report, ReportDraft, ReportId, ValidationError};
use crate::storage::{ImageUpload, ObjectStorage, StorageError};


#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Report {0} not found")]
    NotFound(ReportId),
}


/// Client-local replica of the report collection.
///
/// Only two paths mutate the replica: the optimistic merge after a local
/// `create`, and the wholesale replacement done by the synchronizer.
pub struct ReportStore {
    backend: Arc<dyn ReportBackend>,
    reports: RwLock<Vec<Report>>,
    revision: AtomicU64,
}

impl ReportStore {
    pub fn new(backend: Arc<dyn ReportBackend>) -> Self {
        ReportStore {
            backend,
            reports: RwLock::new(Vec::new()),
            revision: AtomicU64::new(0),
        }
    }

    pub fn backend(&self) -> &Arc<dyn ReportBackend> {
        &self.backend
    }

    /// Newest first, at most one entry per id.
    pub fn list(&self) -> Vec<Report> {
        self.read().clone()
    }

    pub fn get(&self, id: ReportId) -> Option<Report> {
        self.read().iter().find(|r| r.id == id).cloned()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Bumped on every change to the replica.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    pub fn create(&self, draft: ReportDraft) -> Result<Report, ReportError> {
        let new_report = draft.into_new_report()?;

        // No local fallback: a report exists only once the store has it.
        let created = self.backend.insert(&new_report)?;
        info!("Report {} created ({}, {})", created.id, created.incident_type, created.severity);

        self.merge(created.clone());
        Ok(created)
    }

    /// Validates, uploads the attachment, then creates.
    pub fn submit(&self, mut draft: ReportDraft, image: Option<ImageUpload>, storage: &dyn ObjectStorage)
        -> Result<Report, ReportError> {

        draft.validate()?;

        if let Some(image) = image {
            draft.img_path = Some(storage.upload(&image)?);
        }

        let uploaded = draft.img_path.clone();
        self.create(draft).map_err(|err| {
            if let Some(reference) = uploaded {
                if let Err(rm_err) = storage.remove(&reference) {
                    warn!("Fail to remove orphaned image {}: {}", reference, rm_err);
                }
            }
            err
        })
    }

    /// Deletes in the backing store only; the replica follows via the change feed.
    pub fn remove(&self, id: ReportId) -> Result<(), ReportError> {
        match self.backend.delete(id)? {
            0 => Err(ReportError::NotFound(id)),
            _ => {
                info!("Report {} deleted", id);
                Ok(())
            },
        }
    }

    pub fn scoped_to_submitter(&self, submitter_id: &str) -> Vec<Report> {
        self.read().iter()
            .filter(|r| r.submitter_id.as_deref() == Some(submitter_id))
            .cloned()
            .collect()
    }

    pub(crate) fn replace_all(&self, mut reports: Vec<Report>) {
        sort_newest_first(&mut reports);
        let mut seen = HashSet::new();
        reports.retain(|r| seen.insert(r.id));

        let mut current = self.write();
        if *current != reports {
            *current = reports;
            self.revision.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn merge(&self, report: Report) {
        let mut current = self.write();

        current.retain(|r| r.id != report.id);
        let pos = current.iter()
            .position(|r| (r.created_time, r.id) < (report.created_time, report.id))
            .unwrap_or(current.len());
        current.insert(pos, report);

        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    fn read(&self) -> RwLockReadGuard<Vec<Report>> {
        self.reports.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<Vec<Report>> {
        self.reports.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
