use actix_web::{web, HttpResponse, Responder};

use crate::api::error_response;
use crate::metrics::METRICS;
use crate::models::TargetConfig;
use crate::services::{CommandRunner, MonitorError, TargetState};
use crate::state::AppState;

fn describe(target: &TargetState) -> serde_json::Value {
    serde_json::json!({
        "id": target.config().id,
        "name": target.name(),
        "kind": target.kind(),
        "process_name": target.config().process_name,
        "on_state": target.on_state(),
        "pid": target.pid(),
        "states": target.fields(),
    })
}

pub async fn register_target<R: CommandRunner + 'static>(
    data: web::Data<AppState<R>>,
    req: web::Json<TargetConfig>,
) -> impl Responder {
    let config = req.into_inner();
    if config.id.trim().is_empty() || config.name.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "status": "error",
            "message": "Both 'id' and 'name' are required"
        }));
    }
    if config.kind.is_process_backed() && config.path.is_empty() {
        log::warn!("Target '{}' has no path, start commands will fail", config.id);
    }

    let id = config.id.clone();
    let mut monitor = data.lock().await;
    let report = monitor.create_target(config).await;

    log::info!("Target '{}' registered", id);

    match monitor.target(&id) {
        Some(target) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "message": format!("Target '{}' registered", id),
            "target": describe(target),
            "changes": report,
        })),
        None => error_response(&MonitorError::NotFound(id)),
    }
}

pub async fn unregister_target<R: CommandRunner + 'static>(
    data: web::Data<AppState<R>>,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();
    let removed = data.lock().await.remove_target(&id);

    match removed {
        Some(target) => {
            METRICS.reset_target_metrics(&id, target.kind(), target.pid());
            HttpResponse::Ok().json(serde_json::json!({
                "status": "success",
                "message": format!("Target '{}' unregistered", id)
            }))
        }
        None => error_response(&MonitorError::NotFound(id)),
    }
}

pub async fn list_targets<R: CommandRunner + 'static>(data: web::Data<AppState<R>>) -> impl Responder {
    let monitor = data.lock().await;
    let list: Vec<_> = monitor.targets().map(describe).collect();
    HttpResponse::Ok().json(list)
}

pub async fn get_target<R: CommandRunner + 'static>(
    data: web::Data<AppState<R>>,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();
    let monitor = data.lock().await;
    match monitor.target(&id) {
        Some(target) => HttpResponse::Ok().json(describe(target)),
        None => error_response(&MonitorError::NotFound(id)),
    }
}
