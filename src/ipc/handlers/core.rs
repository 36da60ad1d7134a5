use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_str, to_result, with_db, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::snapshot;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

/// Opens (or creates) the store in `path`, seeds an empty one and points the
/// snapshot thread at it.
pub fn select_workspace(state: &mut AppState, path: PathBuf) -> anyhow::Result<bool> {
    let conn = db::open_db(&path)?;
    let seeded = db::seed_defaults(&conn, &state.config.seed)?;
    if state.config.snapshot.enabled {
        state.flush_target.set(path.clone());
    }
    tracing::info!(workspace = %path.display(), seeded, "workspace selected");
    state.workspace = Some(path);
    state.db = Some(conn);
    Ok(seeded)
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match select_workspace(state, path.clone()) {
        Ok(seeded) => ok(
            &req.id,
            json!({ "workspacePath": path.to_string_lossy(), "seeded": seeded }),
        ),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

fn handle_store_snapshot(state: &mut AppState, req: &Request) -> Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let file_name = state.config.snapshot.file_name.clone();
    with_db(state, req, |conn, _| {
        let out = workspace.join(&file_name);
        snapshot::write_snapshot(conn, &out)
            .map_err(|e| HandlerErr::new("io_failed", format!("{e:#}")))?;
        Ok(json!({ "path": out.to_string_lossy() }))
    })
}

/// Accepts either `data` (the dump itself) or `path` (a JSON file on disk).
fn store_import_snapshot(conn: &Connection, params: &Value) -> HandlerResult {
    let dump = if let Some(data) = params.get("data").filter(|v| v.is_object()) {
        data.clone()
    } else if let Some(path) = get_optional_str(params, "path") {
        let text = std::fs::read_to_string(&path)
            .map_err(|e| HandlerErr::new("io_failed", format!("failed to read {}: {}", path, e)))?;
        serde_json::from_str(&text)
            .map_err(|e| HandlerErr::bad_params(format!("snapshot is not valid JSON: {}", e)))?
    } else {
        return Err(HandlerErr::bad_params("missing data or path"));
    };
    let summary = snapshot::import(conn, dump)?;
    to_result(&summary)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "store.snapshot" => Some(handle_store_snapshot(state, req)),
        "store.importSnapshot" => Some(with_db(state, req, store_import_snapshot)),
        _ => None,
    }
}
