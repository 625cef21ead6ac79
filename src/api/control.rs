use actix_web::{web, HttpResponse, Responder};
use log::LevelFilter;
use serde::Deserialize;

use crate::api::error_response;
use crate::services::CommandRunner;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdateQuery {
    #[serde(default)]
    pub force: bool,
}

pub async fn update_target<R: CommandRunner + 'static>(
    data: web::Data<AppState<R>>,
    path: web::Path<String>,
    query: web::Query<UpdateQuery>,
) -> impl Responder {
    let id = path.into_inner();
    let result = data.lock().await.update(&id, query.force);
    match result {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => error_response(&e),
    }
}

/// `on`, `off`, `toggle` or `status` for one target.
pub async fn target_action<R: CommandRunner + 'static>(
    data: web::Data<AppState<R>>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (id, action) = path.into_inner();
    let mut monitor = data.lock().await;

    let result = match action.as_str() {
        "on" => monitor.set_on_state(&id, true).await,
        "off" => monitor.set_on_state(&id, false).await,
        "toggle" => monitor.toggle(&id).await,
        "status" => monitor.request_status(&id).await,
        other => {
            log::debug!("'{}' {} request ignored", id, other);
            return HttpResponse::BadRequest().json(serde_json::json!({
                "status": "error",
                "message": format!("Unknown action '{}'", other)
            }));
        }
    };

    match result {
        Ok(report) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "on_state": monitor.on_state(&id).ok().flatten(),
            "changes": report,
        })),
        Err(e) => error_response(&e),
    }
}

pub async fn toggle_debug() -> impl Responder {
    let enable = log::max_level() < LevelFilter::Debug;
    if enable {
        log::set_max_level(LevelFilter::Debug);
        log::debug!("Debug logging enabled");
    } else {
        log::debug!("Debug logging disabled");
        log::set_max_level(LevelFilter::Info);
    }
    HttpResponse::Ok().json(serde_json::json!({ "debug": enable }))
}
