use crate::classroom;
use crate::ipc::helpers::{
    class_exists, found, get_required_str, student_exists, to_result, with_db, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::Value;

fn log_doubt(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    let concept_id = get_required_str(params, "conceptId")?;
    class_exists(conn, &class_id)?;
    student_exists(conn, &student_id)?;
    to_result(&classroom::log_doubt(conn, &class_id, &student_id, &concept_id)?)
}

fn resolve_doubt(conn: &Connection, params: &Value) -> HandlerResult {
    let doubt_id = get_required_str(params, "doubtId")?;
    to_result(&found(classroom::resolve_doubt(conn, &doubt_id)?, "doubt")?)
}

fn dashboard(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    to_result(&found(classroom::classroom_dashboard(conn, &class_id)?, "class")?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> HandlerResult = match req.method.as_str() {
        "classroom.logDoubt" => log_doubt,
        "classroom.resolveDoubt" => resolve_doubt,
        "classroom.dashboard" => dashboard,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
