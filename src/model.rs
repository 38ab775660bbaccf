use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

use crate::location_sys;
use crate::severity_sys::classify_incident;


pub type ReportId = i32;

pub const ANONYMOUS_LABEL: &'static str = "Anonymous";


#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    pub fn parse(label: &str) -> Option<Severity> {
        match label.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// A report as held by the backing store and replicated locally.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub id: ReportId,
    pub title: String,
    pub description: String,
    pub incident_type: String,
    pub location: String,
    pub severity: Severity,
    pub reporter_label: String,
    pub submitter_id: Option<String>,
    pub created_time: DateTime<Utc>,
    pub img_path: Option<String>,
    /// `None` for records written before the flag existed.
    pub show_on_map: Option<bool>,
}

impl Report {
    pub fn is_mappable(&self) -> bool {
        self.show_on_map.unwrap_or(true)
    }

    pub fn is_anonymous(&self) -> bool {
        self.submitter_id.is_none()
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "id": self.id,
            "title": self.title,
            "description": self.description,
            "incident_type": self.incident_type,
            "location": self.location,
            "severity": self.severity.as_str(),
            "reporter": self.reporter_label,
            "user_id": self.submitter_id,
            "created_time": self.created_time.timestamp(),
            "img_path": self.img_path,
            "show_on_map": self.is_mappable(),
        })
    }
}


#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
}


/// What a submitter hands in. Severity and the map flag are derived when absent.
#[derive(Clone, Debug, Default)]
pub struct ReportDraft {
    pub title: String,
    pub description: String,
    pub incident_type: String,
    pub location: String,
    pub severity: Option<Severity>,
    pub reporter_name: Option<String>,
    pub submitter_id: Option<String>,
    pub img_path: Option<String>,
    pub show_on_map: Option<bool>,
}

impl ReportDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("title", &self.title),
            ("incident type", &self.incident_type),
            ("description", &self.description),
            ("location", &self.location),
        ];

        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(ValidationError::MissingField(*name)),
            None => Ok(()),
        }
    }

    pub fn into_new_report(self) -> Result<NewReport, ValidationError> {
        self.validate()?;

        let severity = self.severity
            .unwrap_or_else(|| classify_incident(&self.incident_type));
        // Submitters may opt out of the map, but only exact points can opt in.
        let is_exact = location_sys::resolve_location(&self.location).is_exact;
        let show_on_map = is_exact && self.show_on_map.unwrap_or(true);
        let reporter_label = self.reporter_name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| ANONYMOUS_LABEL.to_owned());

        Ok(NewReport {
            title: self.title.trim().to_owned(),
            description: self.description.trim().to_owned(),
            incident_type: self.incident_type.trim().to_owned(),
            location: self.location.trim().to_owned(),
            severity,
            reporter_label,
            submitter_id: self.submitter_id,
            img_path: self.img_path,
            show_on_map,
        })
    }
}


/// A validated record ready for the backing store, which assigns id and time.
#[derive(Clone, Debug, PartialEq)]
pub struct NewReport {
    pub title: String,
    pub description: String,
    pub incident_type: String,
    pub location: String,
    pub severity: Severity,
    pub reporter_label: String,
    pub submitter_id: Option<String>,
    pub img_path: Option<String>,
    pub show_on_map: bool,
}

impl NewReport {
    pub fn into_report(self, id: ReportId, created_time: DateTime<Utc>) -> Report {
        Report {
            id,
            title: self.title,
            description: self.description,
            incident_type: self.incident_type,
            location: self.location,
            severity: self.severity,
            reporter_label: self.reporter_label,
            submitter_id: self.submitter_id,
            created_time,
            img_path: self.img_path,
            show_on_map: Some(self.show_on_map),
        }
    }
}


#[cfg(test)]
pub mod tests {
    use super::*;
    use chrono::TimeZone;

    pub fn sample_report(id: ReportId, location: &str, minutes: i64) -> Report {
        Report {
            id,
            title: format!("Report {}", id),
            description: "Something happened".into(),
            incident_type: "Theft".into(),
            location: location.into(),
            severity: Severity::Medium,
            reporter_label: ANONYMOUS_LABEL.into(),
            submitter_id: None,
            created_time: Utc.timestamp(1_700_000_000 + minutes * 60, 0),
            img_path: None,
            show_on_map: Some(true),
        }
    }

    pub fn draft(title: &str, incident_type: &str, location: &str) -> ReportDraft {
        ReportDraft {
            title: title.into(),
            description: "Seen from the street".into(),
            incident_type: incident_type.into(),
            location: location.into(),
            ..ReportDraft::default()
        }
    }

    #[test]
    fn draft_with_blank_field_is_rejected() {
        let mut d = draft("Bag snatched", "Theft", "Gulshan");
        d.description = "   ".into();

        assert_eq!(d.validate(), Err(ValidationError::MissingField("description")));
        assert!(d.into_new_report().is_err());
    }

    #[test]
    fn severity_is_derived_when_absent() {
        let new = draft("Shop held up", "Robbery", "Banani").into_new_report().unwrap();
        assert_eq!(new.severity, Severity::High);

        let mut d = draft("Shop held up", "Robbery", "Banani");
        d.severity = Some(Severity::Low);
        assert_eq!(d.into_new_report().unwrap().severity, Severity::Low);
    }

    #[test]
    fn map_flag_follows_exact_location_when_absent() {
        let exact = draft("Fight", "Assault", "23.8103, 90.4125").into_new_report().unwrap();
        assert!(exact.show_on_map);

        let named = draft("Fight", "Assault", "Dhanmondi").into_new_report().unwrap();
        assert!(!named.show_on_map);
    }

    #[test]
    fn named_location_cannot_opt_into_map() {
        let mut d = draft("Bag snatched", "Theft", "Gulshan");
        d.show_on_map = Some(true);
        assert!(!d.into_new_report().unwrap().show_on_map);

        let mut d = draft("Bag snatched", "Theft", "23.7925, 90.4078");
        d.show_on_map = Some(false);
        assert!(!d.into_new_report().unwrap().show_on_map);
    }

    #[test]
    fn blank_reporter_name_becomes_anonymous() {
        let mut d = draft("Graffiti", "Vandalism", "Mirpur");
        d.reporter_name = Some("  ".into());
        assert_eq!(d.into_new_report().unwrap().reporter_label, ANONYMOUS_LABEL);
    }

    #[test]
    fn missing_map_flag_on_stored_record_means_mappable() {
        let mut r = sample_report(1, "Gulshan", 0);
        r.show_on_map = None;
        assert!(r.is_mappable());

        r.show_on_map = Some(false);
        assert!(!r.is_mappable());
    }
}
