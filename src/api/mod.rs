pub mod control;
pub mod metrics;
pub mod register;

pub use control::{target_action, toggle_debug, update_target};
pub use metrics::get_metrics;
pub use register::{get_target, list_targets, register_target, unregister_target};

use actix_web::{web, HttpResponse, Responder};

use crate::services::{CommandRunner, ControlError, MonitorError};
use crate::state::AppState;

/// Registers every route of the HTTP API.
pub fn configure<R: CommandRunner + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/target/register", web::post().to(register_target::<R>))
        .route("/api/target/list", web::get().to(list_targets::<R>))
        .route("/api/target/{id}", web::get().to(get_target::<R>))
        .route("/api/target/{id}", web::delete().to(unregister_target::<R>))
        .route("/api/target/{id}/update", web::post().to(update_target::<R>))
        .route("/api/target/{id}/{action}", web::post().to(target_action::<R>))
        .route("/api/debug/toggle", web::post().to(toggle_debug))
        .route("/metrics", web::get().to(get_metrics))
        .route("/health", web::get().to(health::<R>));
}

pub fn error_response(e: &MonitorError) -> HttpResponse {
    let message = e.to_string();
    match e {
        MonitorError::NotFound(_) => HttpResponse::NotFound().json(serde_json::json!({
            "status": "error",
            "message": message
        })),
        MonitorError::Control(ControlError::Unsupported { .. }) => {
            HttpResponse::BadRequest().json(serde_json::json!({
                "status": "error",
                "message": message
            }))
        }
        MonitorError::Control(ControlError::CommandFailed { command, output }) => {
            HttpResponse::BadGateway().json(serde_json::json!({
                "status": "error",
                "message": message,
                "command": command,
                "output": output
            }))
        }
    }
}

pub async fn health<R: CommandRunner + 'static>(data: web::Data<AppState<R>>) -> impl Responder {
    let monitor = data.lock().await;
    let snapshot = monitor.snapshot();
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "targets": monitor.target_count(),
        "cpu_divisor": monitor.cpu_divisor(),
        "snapshot_generation": snapshot.generation(),
        "snapshot_stale": snapshot.is_stale(),
        "snapshot_age_secs": snapshot.fetched_at().map(|at| at.elapsed().as_secs()),
    }))
}
