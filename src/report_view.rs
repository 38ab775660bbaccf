//! Presentation views derived from a report snapshot.
//!
//! Every function here is pure over its input slice and keeps the input's
//! newest-first order.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value as JsonValue};

use crate::map_view::MarkerColor;
use crate::model::{Report, Severity};


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeFrame {
    Last24Hours,
    Last7Days,
    Last30Days,
    AllTime,
}

impl TimeFrame {
    pub fn parse(text: &str) -> Option<TimeFrame> {
        match text.trim().to_lowercase().as_str() {
            "24h" => Some(TimeFrame::Last24Hours),
            "7d" => Some(TimeFrame::Last7Days),
            "30d" => Some(TimeFrame::Last30Days),
            "all" | "" => Some(TimeFrame::AllTime),
            _ => None,
        }
    }

    fn window(self) -> Option<Duration> {
        match self {
            TimeFrame::Last24Hours => Some(Duration::hours(24)),
            TimeFrame::Last7Days => Some(Duration::days(7)),
            TimeFrame::Last30Days => Some(Duration::days(30)),
            TimeFrame::AllTime => None,
        }
    }
}

impl Default for TimeFrame {
    fn default() -> Self {
        TimeFrame::AllTime
    }
}


#[derive(Clone, Debug, Default)]
pub struct ReportFilter {
    /// `None` or "all" keeps every type.
    pub incident_type: Option<String>,
    pub time_frame: TimeFrame,
}

impl ReportFilter {
    pub fn matches(&self, report: &Report, now: DateTime<Utc>) -> bool {
        let type_ok = match self.incident_type.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(t) if t.eq_ignore_ascii_case("all") => true,
            Some(t) => report.incident_type.trim().eq_ignore_ascii_case(t),
        };

        let time_ok = match self.time_frame.window() {
            Some(window) => report.created_time > now - window,
            None => true,
        };

        type_ok && time_ok
    }
}


pub struct TickerEntry<'a> {
    pub report: &'a Report,
    pub time_ago: String,
}

impl<'a> TickerEntry<'a> {
    pub fn to_json(&self) -> JsonValue {
        let mut value = self.report.to_json();
        value["time"] = json!(self.time_ago);
        value
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct Hotspot {
    pub location: String,
    pub count: usize,
    pub severity: Severity,
    pub color: MarkerColor,
}

impl Hotspot {
    pub fn to_json(&self) -> JsonValue {
        json!({
            "location": self.location,
            "count": self.count,
            "severity": self.severity.as_str(),
            "color": self.color.as_str(),
        })
    }
}


#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportStats {
    pub total: usize,
    pub critical: usize,
    pub areas_affected: usize,
    pub anonymous: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl ReportStats {
    pub fn to_json(&self) -> JsonValue {
        json!({
            "total": self.total,
            "critical": self.critical,
            "areas_affected": self.areas_affected,
            "anonymous": self.anonymous,
            "by_severity": {
                "low": self.low,
                "medium": self.medium,
                "high": self.high,
            },
        })
    }
}


/// Reports allowed on the map; records without the flag count as mappable.
pub fn mappable(reports: &[Report]) -> Vec<&Report> {
    reports.iter().filter(|r| r.is_mappable()).collect()
}

pub fn ticker_entries<'a, I>(reports: I, now: DateTime<Utc>) -> Vec<TickerEntry<'a>> where
    I: IntoIterator<Item = &'a Report> {

    reports.into_iter()
        .map(|report| TickerEntry {
            report,
            time_ago: time_ago(report.created_time, now),
        })
        .collect()
}

pub fn time_ago(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - created).num_minutes();

    if minutes < 1 {
        "Just now".into()
    }
    else if minutes < 60 {
        format!("{} minutes ago", minutes)
    }
    else if minutes < 24 * 60 {
        format!("{} hours ago", minutes / 60)
    }
    else {
        created.format("%-m/%-d/%Y").to_string()
    }
}

/// Case-insensitive substring match on title, description, location and type.
pub fn search<'a>(reports: &'a [Report], query: &str) -> Vec<&'a Report> {
    let query = query.trim().to_lowercase();

    if query.is_empty() {
        return reports.iter().collect();
    }

    reports.iter()
        .filter(|r| {
            [&r.title, &r.description, &r.location, &r.incident_type].iter()
                .any(|field| field.to_lowercase().contains(&query))
        })
        .collect()
}

pub fn filter<'a>(reports: &[&'a Report], filter: &ReportFilter, now: DateTime<Utc>) -> Vec<&'a Report> {
    reports.iter().copied().filter(|r| filter.matches(r, now)).collect()
}

/// Top `limit` locations by report count; ties keep first-seen order.
pub fn hotspots(reports: &[&Report], limit: usize) -> Vec<Hotspot> {
    let mut order: Vec<Hotspot> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for report in reports {
        match index.get(report.location.as_str()) {
            Some(&i) => {
                let spot = &mut order[i];
                spot.count += 1;
                if report.severity > spot.severity {
                    spot.severity = report.severity;
                    spot.color = MarkerColor::for_severity(report.severity);
                }
            },
            None => {
                index.insert(report.location.as_str(), order.len());
                order.push(Hotspot {
                    location: report.location.clone(),
                    count: 1,
                    severity: report.severity,
                    color: MarkerColor::for_severity(report.severity),
                });
            },
        }
    }

    // Stable, so equal counts stay in first-seen order.
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(limit);
    order
}

pub fn statistics(reports: &[&Report]) -> ReportStats {
    let mut stats = ReportStats::default();
    let mut areas = HashSet::new();

    for report in reports {
        stats.total += 1;
        match report.severity {
            Severity::Low => stats.low += 1,
            Severity::Medium => stats.medium += 1,
            Severity::High => {
                stats.high += 1;
                stats.critical += 1;
            },
        }
        if report.is_anonymous() {
            stats.anonymous += 1;
        }
        areas.insert(report.location.as_str());
    }

    stats.areas_affected = areas.len();
    stats
}
