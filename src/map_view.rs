use cgmath::{Point2, Vector2};
use serde_json::{json, Value as JsonValue};

use crate::location_sys::{self, ResolvedLocation};
use crate::model::{Report, ReportId, Severity};


/// Share of the marker span added on every side when fitting bounds.
const FIT_PADDING: f64 = 0.1;
/// Degrees; keeps a lone marker from collapsing the view to a point.
const MIN_SPAN: f64 = 0.01;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerColor {
    Red,
    Yellow,
    Green,
    Blue,
}

impl MarkerColor {
    pub fn for_severity(severity: Severity) -> MarkerColor {
        MarkerColor::for_label(severity.as_str())
    }

    /// Unknown labels get the default blue.
    pub fn for_label(label: &str) -> MarkerColor {
        match label {
            "high" => MarkerColor::Red,
            "medium" => MarkerColor::Yellow,
            "low" => MarkerColor::Green,
            _ => MarkerColor::Blue,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarkerColor::Red => "red",
            MarkerColor::Yellow => "yellow",
            MarkerColor::Green => "green",
            MarkerColor::Blue => "blue",
        }
    }
}


#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub south_west: Point2<f64>,
    pub north_east: Point2<f64>,
}

impl Bounds {
    /// Smallest box around `points` grown by the padding factor; `None` when empty.
    pub fn fit(points: &[Point2<f64>], padding: f64) -> Option<Bounds> {
        let first = *points.first()?;

        let (min, max) = points.iter().fold((first, first), |(min, max), p| {
            (Point2::new(min.x.min(p.x), min.y.min(p.y)),
             Point2::new(max.x.max(p.x), max.y.max(p.y)))
        });

        let span = max - min;
        let half_extra = Vector2::new(
            (span.x.max(MIN_SPAN) * (1.0 + 2.0 * padding) - span.x) / 2.0,
            (span.y.max(MIN_SPAN) * (1.0 + 2.0 * padding) - span.y) / 2.0,
        );

        Some(Bounds {
            south_west: min - half_extra,
            north_east: max + half_extra,
        })
    }

    pub fn center(&self) -> Point2<f64> {
        self.south_west + (self.north_east - self.south_west) / 2.0
    }

    #[cfg(test)]
    pub fn contains(&self, p: Point2<f64>) -> bool {
        p.x >= self.south_west.x && p.x <= self.north_east.x
            && p.y >= self.south_west.y && p.y <= self.north_east.y
    }

    fn to_json(&self) -> JsonValue {
        json!({
            "south": self.south_west.y,
            "west": self.south_west.x,
            "north": self.north_east.y,
            "east": self.north_east.x,
        })
    }
}

impl Default for Bounds {
    /// Bangladesh, the area the base map opens on.
    fn default() -> Self {
        Bounds {
            south_west: Point2::new(88.0, 20.5),
            north_east: Point2::new(92.7, 26.7),
        }
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub report_id: ReportId,
    pub location: ResolvedLocation,
    pub color: MarkerColor,
    pub title: String,
    pub incident_type: String,
    pub severity: Severity,
}

impl Marker {
    fn from_report(report: &Report) -> Self {
        Marker {
            report_id: report.id,
            location: location_sys::resolve_location(&report.location),
            color: MarkerColor::for_severity(report.severity),
            title: report.title.clone(),
            incident_type: report.incident_type.clone(),
            severity: report.severity,
        }
    }

    pub fn position(&self) -> Point2<f64> {
        self.location.point()
    }

    pub fn is_approximate(&self) -> bool {
        !self.location.is_exact
    }

    fn to_json(&self, selected: bool) -> JsonValue {
        json!({
            "id": self.report_id,
            "latitude": self.location.latitude,
            "longitude": self.location.longitude,
            "icon": {
                "color": self.color.as_str(),
                "approximate": self.is_approximate(),
            },
            "popup": {
                "title": self.title,
                "incident_type": self.incident_type,
                "severity": self.severity.as_str(),
                "location": self.location.display_name,
            },
            "selected": selected,
        })
    }
}


/// Marker layer over the base map.
///
/// Every update throws the old markers away and places the new set, so a
/// marker is only ever absent, placed, selected or gone. At most one marker
/// is selected at a time.
#[derive(Clone)]
pub struct MapView {
    markers: Vec<Marker>,
    selected: Option<ReportId>,
    bounds: Bounds,
}

impl MapView {
    pub fn new() -> Self {
        MapView::with_bounds(Bounds::default())
    }

    pub fn with_bounds(bounds: Bounds) -> Self {
        MapView {
            markers: Vec::new(),
            selected: None,
            bounds,
        }
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn marker(&self, id: ReportId) -> Option<&Marker> {
        self.markers.iter().find(|m| m.report_id == id)
    }

    pub fn selected(&self) -> Option<&Marker> {
        self.selected.and_then(|id| self.marker(id))
    }

    /// Replaces every marker with the given mappable reports and refits the view.
    pub fn update(&mut self, mappable: &[&Report]) {
        self.clear();

        self.markers = mappable.iter()
            .map(|report| Marker::from_report(report))
            .collect();

        let points = self.markers.iter().map(Marker::position).collect::<Vec<_>>();
        if let Some(bounds) = Bounds::fit(&points, FIT_PADDING) {
            self.bounds = bounds;
        }

        debug!("Placed {} markers", self.markers.len());
    }

    /// Opens the tooltip of `id`, closing any other. False if no such marker.
    pub fn select(&mut self, id: ReportId) -> bool {
        if self.marker(id).is_some() {
            self.selected = Some(id);
            true
        }
        else {
            false
        }
    }

    pub fn click_outside(&mut self) {
        self.selected = None;
    }

    pub fn to_json(&self) -> JsonValue {
        let selected = self.selected().map(|m| m.report_id);
        let markers = self.markers().iter()
            .map(|m| m.to_json(selected == Some(m.report_id)))
            .collect::<Vec<_>>();
        let bounds = self.bounds();
        let center = bounds.center();

        json!({
            "markers": markers,
            "size": markers.len(),
            "selected": selected,
            "bounds": bounds.to_json(),
            "center": { "latitude": center.y, "longitude": center.x },
        })
    }

    fn clear(&mut self) {
        self.markers.clear();
        self.click_outside();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::sample_report;

    fn report(id: ReportId, location: &str, severity: Severity) -> Report {
        let mut r = sample_report(id, location, id as i64);
        r.severity = severity;
        r
    }

    #[test]
    fn severity_colors() {
        assert_eq!(MarkerColor::for_severity(Severity::High), MarkerColor::Red);
        assert_eq!(MarkerColor::for_severity(Severity::Medium), MarkerColor::Yellow);
        assert_eq!(MarkerColor::for_severity(Severity::Low), MarkerColor::Green);
        assert_eq!(MarkerColor::for_label("critical"), MarkerColor::Blue);
    }

    #[test]
    fn exact_coordinate_marker_sits_on_the_point() {
        let r = report(1, "23.8103, 90.4125", Severity::High);
        let mut view = MapView::new();

        view.update(&[&r]);

        let marker = view.marker(1).unwrap();
        assert_eq!(marker.position(), Point2::new(90.4125, 23.8103));
        assert!(!marker.is_approximate());
        assert_eq!(marker.color, MarkerColor::Red);
    }

    #[test]
    fn named_location_marker_is_approximate() {
        let r = report(1, "Gulshan", Severity::Low);
        let mut view = MapView::new();

        view.update(&[&r]);

        assert!(view.marker(1).unwrap().is_approximate());
        assert_eq!(view.to_json()["markers"][0]["icon"]["approximate"], true);
    }

    #[test]
    fn update_replaces_previous_markers() {
        let a = report(1, "Gulshan", Severity::Low);
        let b = report(2, "Banani", Severity::Medium);
        let mut view = MapView::new();

        view.update(&[&a, &b]);
        assert_eq!(view.markers().len(), 2);

        view.update(&[&b]);
        assert_eq!(view.markers().len(), 1);
        assert!(view.marker(1).is_none());
    }

    #[test]
    fn only_one_marker_selected() {
        let a = report(1, "Gulshan", Severity::Low);
        let b = report(2, "Banani", Severity::Medium);
        let mut view = MapView::new();
        view.update(&[&a, &b]);

        assert!(view.select(1));
        assert!(view.select(2));
        assert_eq!(view.selected().unwrap().report_id, 2);

        let json = view.to_json();
        let flags = json["markers"].as_array().unwrap().iter()
            .filter(|m| m["selected"] == true)
            .count();
        assert_eq!(flags, 1);

        view.click_outside();
        assert!(view.selected().is_none());
    }

    #[test]
    fn selecting_unknown_marker_keeps_state() {
        let a = report(1, "Gulshan", Severity::Low);
        let mut view = MapView::new();
        view.update(&[&a]);
        view.select(1);

        assert!(!view.select(99));
        assert_eq!(view.selected().unwrap().report_id, 1);
    }

    #[test]
    fn removed_marker_drops_selection() {
        let a = report(1, "Gulshan", Severity::Low);
        let mut view = MapView::new();
        view.update(&[&a]);
        view.select(1);

        view.update(&[]);
        assert!(view.selected().is_none());
        assert!(view.markers().is_empty());
    }

    #[test]
    fn bounds_fit_markers_with_padding() {
        let a = report(1, "23.0, 90.0", Severity::Low);
        let b = report(2, "24.0, 91.0", Severity::Low);
        let mut view = MapView::new();

        view.update(&[&a, &b]);

        let bounds = view.bounds();
        assert!((bounds.south_west.x - 89.9).abs() < 1e-9);
        assert!((bounds.south_west.y - 22.9).abs() < 1e-9);
        assert!((bounds.north_east.x - 91.1).abs() < 1e-9);
        assert!((bounds.north_east.y - 24.1).abs() < 1e-9);
        assert!(view.markers().iter().all(|m| bounds.contains(m.position())));
    }

    #[test]
    fn single_marker_gets_minimum_span() {
        let bounds = Bounds::fit(&[Point2::new(90.0, 23.0)], FIT_PADDING).unwrap();

        assert!(bounds.north_east.x > bounds.south_west.x);
        assert!(bounds.north_east.y > bounds.south_west.y);
        assert!((bounds.center().x - 90.0).abs() < 1e-9);
    }

    #[test]
    fn empty_update_keeps_previous_bounds() {
        let a = report(1, "23.0, 90.0", Severity::Low);
        let mut view = MapView::new();
        view.update(&[&a]);
        let fitted = view.bounds();

        view.update(&[]);
        assert_eq!(view.bounds(), fitted);

        let fresh = MapView::new();
        assert_eq!(fresh.bounds(), Bounds::default());
    }
}
