use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use std::path::Path;
use tokio::sync::watch;

mod api;
mod cli;
mod metrics;
mod models;
mod services;
mod state;

use cli::CommandArgs;
use metrics::{MetricsPublisher, METRICS};
use models::TargetConfig;
use services::{run_loop, Monitor, ShellRunner, SideTask};
use state::new_state;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    init_logging(args.debug);

    let bind_address = format!("{}:{}", args.address, args.port);
    let cpu_divisor = args.cpu_divisor.divisor();
    log::debug!("CPU divisor {:?} = {}", args.cpu_divisor, cpu_divisor);

    let state = new_state(Monitor::new(ShellRunner, &args.ps_command, cpu_divisor));

    if let Some(path) = &args.targets {
        let configs = load_targets(path)?;
        let mut monitor = state.lock().await;
        for config in configs {
            monitor.create_target(config).await;
        }
        log::info!("Loaded {} targets from {}", monitor.target_count(), path.display());
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let side_tasks: Vec<Box<dyn SideTask>> = vec![Box::new(MetricsPublisher::new(METRICS.clone()))];
    let reconciler = actix_rt::spawn(run_loop(state.clone(), args.cadence(), side_tasks, stop_rx));

    print_banner(&args);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(api::configure::<ShellRunner>)
    })
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {}", bind_address))?
    .run()
    .await?;

    log::info!("Server stopped, waiting for the reconciliation loop");
    stop_tx.send(true).ok();
    if let Err(e) = reconciler.await {
        log::error!("Reconciliation loop ended abnormally: {}", e);
    }
    Ok(())
}

/// Everything is compiled in at debug level; the effective level is the
/// global max level so `/api/debug/toggle` can switch it at runtime.
fn init_logging(debug: bool) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    log::set_max_level(if debug { LevelFilter::Debug } else { LevelFilter::Info });
}

fn load_targets(path: &Path) -> anyhow::Result<Vec<TargetConfig>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read targets file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse targets file {}", path.display()))
}

fn print_banner(args: &CommandArgs) {
    println!("╔═══════════════════════════════════════════════════════════╗");
    println!("║      App Watcher v{:<40}║", env!("CARGO_PKG_VERSION"));
    println!("╚═══════════════════════════════════════════════════════════╝");
    println!();
    println!("🚀 Server starting on http://{}:{}", args.address, args.port);
    println!();
    println!("📋 Available endpoints:");
    println!("  POST   /api/target/register          - Register a target");
    println!("  DELETE /api/target/{{id}}              - Unregister a target");
    println!("  GET    /api/target/list              - List all targets");
    println!("  GET    /api/target/{{id}}              - Show one target");
    println!("  POST   /api/target/{{id}}/update       - Update against the last snapshot");
    println!("  POST   /api/target/{{id}}/on|off|toggle|status");
    println!("  POST   /api/debug/toggle             - Toggle debug logging");
    println!("  GET    /metrics                      - Prometheus metrics");
    println!("  GET    /health                       - Health check");
    println!();
    println!("💡 Settings:");
    println!("  • State every {}s, stats every {}s", args.state_interval, args.stats_interval);
    println!("  • CPU divisor: {:?}", args.cpu_divisor);
    println!("  • Process table: {}", args.ps_command);
    println!("═══════════════════════════════════════════════════════════");
}
