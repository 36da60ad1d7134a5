use crate::ipc::helpers::{
    found, get_optional_str, get_required_str, to_result, with_db, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::proctoring::{self, Severity};
use rusqlite::Connection;
use serde_json::{json, Value};

fn start(conn: &Connection, params: &Value) -> HandlerResult {
    let exam_id = get_required_str(params, "examId")?;
    let student_id = get_required_str(params, "studentId")?;
    to_result(&proctoring::start_session(conn, &exam_id, &student_id)?)
}

/// Records one suspicious-activity flag. Severity defaults to low.
fn log_activity(conn: &Connection, params: &Value) -> HandlerResult {
    let session_id = get_required_str(params, "sessionId")?;
    let kind = get_required_str(params, "type")?;
    let severity = match get_optional_str(params, "severity") {
        None => Severity::default(),
        Some(raw) => Severity::parse(&raw)
            .ok_or_else(|| HandlerErr::bad_params(format!("invalid severity: {}", raw)))?,
    };
    let details = params.get("details").cloned().unwrap_or_else(|| json!({}));
    let flag = proctoring::log_activity(conn, &session_id, &kind, severity, details)?;
    to_result(&found(flag, "session")?)
}

fn end(conn: &Connection, params: &Value) -> HandlerResult {
    let session_id = get_required_str(params, "sessionId")?;
    to_result(&found(proctoring::end_session(conn, &session_id)?, "session")?)
}

fn report(conn: &Connection, params: &Value) -> HandlerResult {
    let session_id = get_required_str(params, "sessionId")?;
    to_result(&found(proctoring::session_report(conn, &session_id)?, "session")?)
}

/// Never `not_found`: an exam nobody has finished yet reads as secure.
fn exam_summary(conn: &Connection, params: &Value) -> HandlerResult {
    let exam_id = get_required_str(params, "examId")?;
    to_result(&proctoring::exam_integrity_summary(conn, &exam_id)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> HandlerResult = match req.method.as_str() {
        "proctoring.start" => start,
        "proctoring.log" => log_activity,
        "proctoring.end" => end,
        "proctoring.report" => report,
        "proctoring.examSummary" => exam_summary,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
