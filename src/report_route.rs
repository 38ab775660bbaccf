use std::sync::{Arc, RwLock};

use chrono::Utc;
use rocket::{
    State,
    http::Status,
    request::Form,
    response::{
        content::Json,
        status::{BadRequest, Custom, NotFound},
    },
};
use serde_json::json;

use crate::map_view::MapView;
use crate::model::{ReportDraft, ReportId};
use crate::report_sys::{ReportError, ReportStore};
use crate::report_view::{self, ReportFilter, TickerEntry, TimeFrame};
use crate::session::{Admin, SessionUser};
use crate::storage::{ImageUpload, ObjectStorage};


type JsonResult = Result<Json<String>, BadRequest<String>>;
type StringResult = Result<String, BadRequest<String>>;


fn make_json_error(err: String) -> JsonResult {
    Err(BadRequest(Some(err)))
}

fn make_string_error(err: String) -> StringResult {
    Err(BadRequest(Some(err)))
}


/// Map markers rebuilt only when the replica has moved on.
struct ReportMapCache {
    view: MapView,
    revision: Option<u64>,
}

impl ReportMapCache {
    fn new() -> Self {
        ReportMapCache {
            view: MapView::new(),
            revision: None,
        }
    }

    fn is_valid(&self, revision: u64) -> bool {
        self.revision == Some(revision)
    }
}


pub struct ReportService {
    store: Arc<ReportStore>,
    storage: Arc<dyn ObjectStorage>,
    map_cache: RwLock<ReportMapCache>,
    hotspot_limit: usize,
}

impl ReportService {
    pub fn new(store: Arc<ReportStore>, storage: Arc<dyn ObjectStorage>, hotspot_limit: usize) -> Self {
        ReportService {
            store,
            storage,
            map_cache: RwLock::new(ReportMapCache::new()),
            hotspot_limit,
        }
    }

    fn report_map(&self) -> MapView {
        let revision = self.store.revision();

        // 유효한 캐시 데이터가 있다면 반환.
        {
            let cache = self.map_cache.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            if cache.is_valid(revision) {
                return cache.view.clone();
            }
        }

        let reports = self.store.list();
        let mut cache = self.map_cache.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.view.update(&report_view::mappable(&reports));
        cache.revision = Some(revision);

        cache.view.clone()
    }
}


#[derive(FromForm)]
pub struct ReportForm {
    title: String,
    incident_type: String,
    description: String,
    location: String,
    show_on_map: Option<bool>,
    anonymous: Option<bool>,
    reporter_name: Option<String>,
    image: Option<String>,
}

impl ReportForm {
    fn verify_error(&self) -> Option<&'static str> {
        if self.title.len() > 256 {
            Some("The maximum length of the title is 256")
        }
        else if self.incident_type.len() > 64 {
            Some("The maximum length of the incident type is 64")
        }
        else if self.location.len() > 512 {
            Some("The maximum length of the location is 512")
        }
        else if self.description.len() >= 65536 {
            Some("The maximum length of the description is 65536")
        }
        else {
            None
        }
    }

    fn into_draft(self, submitter_id: Option<String>) -> ReportDraft {
        let reporter_name = if self.anonymous.unwrap_or(false) {
            None
        }
        else {
            self.reporter_name
        };

        ReportDraft {
            title: self.title,
            description: self.description,
            incident_type: self.incident_type,
            location: self.location,
            severity: None,
            reporter_name,
            submitter_id,
            img_path: None,
            show_on_map: self.show_on_map,
        }
    }
}


#[get("/reports?<q>&<kind>&<frame>")]
pub fn get_reports(q: Option<String>, kind: Option<String>, frame: Option<String>,
    service: State<ReportService>) -> JsonResult {

    let time_frame = match frame.as_deref().map(TimeFrame::parse) {
        Some(Some(tf)) => tf,
        Some(None) => return make_json_error("Invalid time frame".into()),
        None => TimeFrame::AllTime,
    };
    let filter = ReportFilter { incident_type: kind, time_frame };

    let now = Utc::now();
    let reports = service.store.list();
    let matched = report_view::search(&reports, q.as_deref().unwrap_or(""));
    let entries = report_view::ticker_entries(report_view::filter(&matched, &filter, now), now)
        .iter()
        .map(TickerEntry::to_json)
        .collect::<Vec<_>>();

    Ok(Json(json!({
        "reports": entries,
        "size": entries.len(),
    }).to_string()))
}

#[get("/reports/mine")]
pub fn get_my_reports(user: SessionUser, service: State<ReportService>) -> Json<String> {
    let now = Utc::now();
    let reports = match user.0 {
        Some(ref id) => service.store.scoped_to_submitter(id),
        None => Vec::new(),
    };

    let entries = report_view::ticker_entries(&reports, now).iter()
        .map(TickerEntry::to_json)
        .collect::<Vec<_>>();

    Json(json!({
        "reports": entries,
        "size": entries.len(),
    }).to_string())
}

#[get("/report?<id>")]
pub fn get_report(id: ReportId, service: State<ReportService>) -> Result<Json<String>, NotFound<String>> {
    service.store.get(id)
        .map(|r| Json(r.to_json().to_string()))
        .ok_or_else(|| NotFound("Not found".into()))
}

/// `selected` opens that marker's popup; an id with no marker selects nothing.
#[get("/report-map?<selected>")]
pub fn get_report_map(selected: Option<ReportId>, service: State<ReportService>) -> Json<String> {
    let mut view = service.report_map();
    if let Some(id) = selected {
        view.select(id);
    }

    Json(view.to_json().to_string())
}

#[get("/hotspots?<limit>&<q>")]
pub fn get_hotspots(limit: Option<usize>, q: Option<String>, service: State<ReportService>) -> Json<String> {
    let reports = service.store.list();
    let matched = report_view::search(&reports, q.as_deref().unwrap_or(""));
    let spots = report_view::hotspots(&matched, limit.unwrap_or(service.hotspot_limit))
        .iter()
        .map(|spot| spot.to_json())
        .collect::<Vec<_>>();

    Json(json!({
        "hotspots": spots,
        "size": spots.len(),
    }).to_string())
}

#[get("/stats")]
pub fn get_stats(service: State<ReportService>) -> Json<String> {
    let reports = service.store.list();
    let all = report_view::search(&reports, "");

    Json(report_view::statistics(&all).to_json().to_string())
}

#[post("/report", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_report(form: Option<Form<ReportForm>>, user: SessionUser, service: State<ReportService>)
    -> StringResult {

    let form = match form {
        Some(form) => form.into_inner(),
        None => return make_string_error("Invalid form".into()),
    };

    if let Some(err) = form.verify_error() {
        return make_string_error(err.to_string());
    }

    let image = match form.image.as_deref().filter(|uri| !uri.is_empty()) {
        Some(uri) => match ImageUpload::from_data_uri(uri) {
            Ok(image) => Some(image),
            Err(err) => return make_string_error(err.to_string()),
        },
        None => None,
    };

    let draft = form.into_draft(user.0);

    match service.store.submit(draft, image, service.storage.as_ref()) {
        Ok(report) => Ok(report.id.to_string()),
        Err(err) => {
            warn!("Report submission failed: {}", err);
            make_string_error(err.to_string())
        },
    }
}

#[delete("/report?<id>")]
pub fn delete_report(id: ReportId, _admin: Admin, service: State<ReportService>)
    -> Result<String, Custom<String>> {

    match service.store.remove(id) {
        Ok(()) => Ok(id.to_string()),
        Err(err @ ReportError::NotFound(_)) => Err(Custom(Status::NotFound, err.to_string())),
        Err(err) => {
            warn!("Fail to delete report {}: {}", id, err);
            Err(Custom(Status::BadRequest,
                format!("Could not delete report {}, it is still listed. Try again: {}", id, err)))
        },
    }
}
