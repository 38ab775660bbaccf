#![feature(proc_macro_hygiene, decl_macro)]


#[macro_use] extern crate lazy_static;
#[macro_use] extern crate rocket;
#[macro_use] extern crate diesel;
#[macro_use] extern crate log;


mod config;
mod db;
mod logger;
mod location_sys;
mod map_view;
mod model;
mod report_route;
mod report_sync;
mod report_sys;
mod report_view;
mod session;
mod severity_sys;
mod storage;
mod task_scheduler;
mod util;


use std::{
    path::PathBuf,
    process,
    sync::Arc,
    time::Duration,
};
use rocket::{State, response::NamedFile};

use config::AppConfig;
use db::{ReportBackend, memory::MemoryBackend, pg::PgBackend};
use report_route::ReportService;
use report_sync::ReportSynchronizer;
use report_sys::ReportStore;
use storage::DirStorage;
use task_scheduler::TaskSchedulerBuilder;


const IMAGE_PUBLIC_DIR: &'static str = "/images";


#[get("/")]
fn index() -> &'static str {
    "Crime Map Server"
}

#[get("/images/<file..>")]
fn get_image_file(file: PathBuf, config: State<AppConfig>) -> Option<NamedFile> {
    NamedFile::open(config.image_dir.join(file)).ok()
}


fn open_backend(config: &AppConfig) -> Arc<dyn ReportBackend> {
    match config.database_url {
        Some(ref url) => match PgBackend::connect(url) {
            Ok(backend) => Arc::new(backend),
            Err(err) => {
                error!("{}", err);
                process::exit(1);
            },
        },
        None if config.is_dev() => {
            warn!("DATABASE_URL is not set, reports are kept in memory");
            Arc::new(MemoryBackend::new())
        },
        None => {
            error!("DATABASE_URL must be set in {} mode", config.rocket_env);
            process::exit(1);
        },
    }
}


fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {}", err);
            process::exit(1);
        },
    };

    if let Err(err) = logger::init_logger(config.log_level) {
        eprintln!("Logger setup failed: {}", err);
    }

    let _sentry = config.sentry_dsn.as_ref()
        .map(|dsn| sentry::init(dsn.as_str()));

    info!("Starting in {} mode", config.rocket_env);

    let storage = match DirStorage::new(&config.image_dir, IMAGE_PUBLIC_DIR) {
        Ok(storage) => Arc::new(storage),
        Err(err) => {
            error!("Initial directory creation failed: {}", err);
            process::exit(1);
        },
    };

    let store = Arc::new(ReportStore::new(open_backend(&config)));
    let sync = Arc::new(ReportSynchronizer::new(store.clone(), config.feed_poll_interval));

    // The resync is the only periodic job.
    let mut scheduler = TaskSchedulerBuilder::new()
        .n_workers(1)
        .period_resolution(Duration::from_millis(500));
    report_sync::init_report_sync(&mut scheduler, sync.clone(), config.resync_period);
    let scheduler = scheduler.build();

    let service = ReportService::new(store, storage, config.hotspot_limit);

    let err = rocket::ignite()
        .manage(service)
        .manage(config)
        .mount("/", routes![index, get_image_file])
        .mount("/", routes![
            report_route::get_reports,
            report_route::get_my_reports,
            report_route::get_report,
            report_route::get_report_map,
            report_route::get_hotspots,
            report_route::get_stats,
            report_route::post_report,
            report_route::delete_report,
        ])
        .launch();

    error!("Server stopped: {}", err);

    sync.stop();
    scheduler.join();
}
