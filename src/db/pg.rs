use std::{
    sync::{Arc, Mutex},
    time::SystemTime,
};

use diesel::prelude::*;
use diesel::pg::PgConnection;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use super::{BackendResult, BackendError, ReportBackend};
use super::change_feed::{ChangeEvent, ChangeHub, Subscription};
use super::models::{NewReportRow, ReportRow};
use super::schema::{self, reports::dsl::{self as r_dsl}};
use crate::model::{NewReport, Report, ReportId};


/// libpq messages for a session the server or network has dropped.
const LOST_CONNECTION_MESSAGES: [&'static str; 4] = [
    "server closed the connection",
    "terminating connection",
    "no connection to the server",
    "connection not open",
];


/// PostgreSQL store.
///
/// The change hub only hears writes made through this process. Rows written
/// by other server instances or directly in the database are picked up by
/// the synchronizer's periodic resync, not by a signal.
pub struct PgBackend {
    database_url: String,
    conn: ConnectionSlot<PgConnection>,
    hub: Arc<ChangeHub>,
}

impl PgBackend {
    pub fn connect(database_url: &str) -> BackendResult<Self> {
        let conn = PgConnection::establish(database_url)?;
        info!("Connected to report database");

        Ok(PgBackend {
            database_url: database_url.to_owned(),
            conn: ConnectionSlot::new(conn),
            hub: ChangeHub::new(),
        })
    }

    fn run<T, Q>(&self, query: Q) -> BackendResult<T> where
        Q: FnOnce(&PgConnection) -> QueryResult<T> {

        self.conn.run(|| PgConnection::establish(&self.database_url), query)
    }
}

impl ReportBackend for PgBackend {
    fn select_all(&self) -> BackendResult<Vec<Report>> {
        let rows = self.run(|conn| {
            r_dsl::reports
                .order((r_dsl::created_time.desc(), r_dsl::id.desc()))
                .load::<ReportRow>(conn)
        })?;

        Ok(rows.into_iter().map(ReportRow::into_report).collect())
    }

    fn insert(&self, report: &NewReport) -> BackendResult<Report> {
        let row = NewReportRow::from_new_report(report, SystemTime::now());

        let inserted = self.run(|conn| {
            diesel::insert_into(schema::reports::table)
                .values(&row)
                .get_result::<ReportRow>(conn)
        })?;

        self.hub.publish(ChangeEvent::Insert);
        Ok(inserted.into_report())
    }

    fn delete(&self, id: ReportId) -> BackendResult<usize> {
        let cnt = self.run(|conn| diesel::delete(r_dsl::reports.find(id)).execute(conn))?;

        if cnt > 0 {
            self.hub.publish(ChangeEvent::Delete);
        }
        Ok(cnt)
    }

    fn subscribe(&self) -> BackendResult<Subscription> {
        Ok(self.hub.subscribe())
    }
}


/// A single connection that is dropped when it goes bad and re-established
/// on the next call.
struct ConnectionSlot<C> {
    conn: Mutex<Option<C>>,
}

impl<C> ConnectionSlot<C> {
    fn new(conn: C) -> Self {
        ConnectionSlot {
            conn: Mutex::new(Some(conn)),
        }
    }

    fn run<T, E, F, Q>(&self, connect: F, query: Q) -> BackendResult<T> where
        F: FnOnce() -> Result<C, E>,
        BackendError: From<E>,
        Q: FnOnce(&C) -> QueryResult<T> {

        let mut slot = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let conn = match slot.take() {
            Some(conn) => conn,
            None => {
                let conn = connect()?;
                info!("Reconnected to report database");
                conn
            },
        };

        let result = query(&conn);
        match result {
            Err(ref err) if is_connection_lost(err) => {
                warn!("Lost report database connection: {}", err);
            },
            _ => *slot = Some(conn),
        }

        Ok(result?)
    }
}

fn is_connection_lost(err: &DieselError) -> bool {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UnableToSendCommand, _) => true,
        DieselError::DatabaseError(_, info) => {
            let message = info.message().to_lowercase();
            LOST_CONNECTION_MESSAGES.iter().any(|m| message.contains(m))
        },
        _ => false,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use diesel::ConnectionError;

    fn lost() -> DieselError {
        DieselError::DatabaseError(
            DatabaseErrorKind::UnableToSendCommand,
            Box::new(String::from("no connection to the server")))
    }

    #[test]
    fn connection_loss_is_recognised() {
        assert!(is_connection_lost(&lost()));
        assert!(is_connection_lost(&DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new(String::from("FATAL: terminating connection due to administrator command")))));

        assert!(!is_connection_lost(&DieselError::NotFound));
        assert!(!is_connection_lost(&DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new(String::from("duplicate key value")))));
    }

    #[test]
    fn lost_connection_is_reestablished_on_next_call() {
        let slot = ConnectionSlot::new(1u32);
        let connects = AtomicUsize::new(0);

        let result: BackendResult<u32> = slot.run(|| Ok::<_, ConnectionError>(0), |_| Err(lost()));
        assert!(matches!(result, Err(BackendError::Query(_))));

        // The database is still down.
        let result: BackendResult<u32> = slot.run(
            || Err(ConnectionError::BadConnection("connection refused".into())),
            |conn| Ok(*conn));
        assert!(matches!(result, Err(BackendError::Connection(_))));

        for _ in 0..2 {
            let result = slot.run(|| {
                connects.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ConnectionError>(2u32)
            }, |conn| Ok(*conn));
            assert_eq!(result.unwrap(), 2);
        }
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ordinary_query_error_keeps_connection() {
        let slot = ConnectionSlot::new(1u32);

        let result: BackendResult<u32> = slot.run(|| Ok::<_, ConnectionError>(2), |_| Err(DieselError::NotFound));
        assert!(result.is_err());

        let result = slot.run(|| Ok::<_, ConnectionError>(2), |conn| Ok(*conn));
        assert_eq!(result.unwrap(), 1);
    }
}
