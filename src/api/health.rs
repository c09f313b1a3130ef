use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

use super::AppState;

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Resident and virtual memory of this process in bytes, or `null` when the
/// platform does not report them.
fn memory_usage() -> Value {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return Value::Null;
    };

    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing().with_memory(),
    );

    match system.process(pid) {
        Some(process) => json!({ "rss": process.memory(), "virtual": process.virtual_memory() }),
        None => Value::Null,
    }
}

/// `GET /`: what this service is and where to find things.
pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "portbox Port Check API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "ready": "/health/ready",
            "live": "/health/live",
            "checkPort": "POST /api/check-port",
            "checkPorts": "POST /api/check-ports",
            "checkPortRange": "POST /api/check-port-range"
        }
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": now(),
        "uptime": state.uptime().as_secs_f64(),
        "memory": memory_usage(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn ready() -> Json<Value> {
    Json(json!({ "status": "ready", "timestamp": now() }))
}

pub async fn live() -> Json<Value> {
    Json(json!({ "status": "alive", "timestamp": now() }))
}
