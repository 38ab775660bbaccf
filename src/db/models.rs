use std::time::SystemTime;

use chrono::{DateTime, Utc};

use super::schema::reports;
use crate::model::{NewReport, Report, Severity};
use crate::severity_sys::classify_incident;


#[derive(Queryable)]
pub struct ReportRow {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub incident_type: String,
    pub location: String,
    pub severity: String,
    pub reporter_label: String,
    pub submitter_id: Option<String>,
    pub created_time: SystemTime,
    pub img_path: Option<String>,
    pub show_on_map: Option<bool>,
}

impl ReportRow {
    pub fn into_report(self) -> Report {
        // Rows edited by hand may carry a label outside the three tiers.
        let severity = Severity::parse(&self.severity)
            .unwrap_or_else(|| classify_incident(&self.incident_type));

        Report {
            id: self.id,
            title: self.title,
            description: self.description,
            incident_type: self.incident_type,
            location: self.location,
            severity,
            reporter_label: self.reporter_label,
            submitter_id: self.submitter_id,
            created_time: DateTime::<Utc>::from(self.created_time),
            img_path: self.img_path,
            show_on_map: self.show_on_map,
        }
    }
}

#[derive(Insertable)]
#[table_name="reports"]
pub struct NewReportRow<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub incident_type: &'a str,
    pub location: &'a str,
    pub severity: &'a str,
    pub reporter_label: &'a str,
    pub submitter_id: Option<&'a str>,
    pub created_time: SystemTime,
    pub img_path: Option<&'a str>,
    pub show_on_map: Option<bool>,
}

impl<'a> NewReportRow<'a> {
    pub fn from_new_report(report: &'a NewReport, created_time: SystemTime) -> Self {
        NewReportRow {
            title: &report.title,
            description: &report.description,
            incident_type: &report.incident_type,
            location: &report.location,
            severity: report.severity.as_str(),
            reporter_label: &report.reporter_label,
            submitter_id: report.submitter_id.as_deref(),
            created_time,
            img_path: report.img_path.as_deref(),
            show_on_map: Some(report.show_on_map),
        }
    }
}
