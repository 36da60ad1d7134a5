use crate::ipc::helpers::{
    class_exists, found, get_optional_str, get_required_str, parse_params, student_exists,
    to_result, with_db, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, MeetingPatch, NewMeeting};
use rusqlite::Connection;
use serde_json::{json, Value};

fn meetings_list(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_optional_str(params, "classId");
    to_result(&records::list_meetings(conn, class_id.as_deref())?)
}

fn meetings_schedule(conn: &Connection, params: &Value) -> HandlerResult {
    let new: NewMeeting = parse_params(params)?;
    if new.class_id.is_empty() {
        return Err(HandlerErr::bad_params("missing classId"));
    }
    class_exists(conn, &new.class_id)?;
    student_exists(conn, &new.student_id)?;
    to_result(&records::insert_meeting(conn, &new)?)
}

fn meetings_get(conn: &Connection, params: &Value) -> HandlerResult {
    let id = get_required_str(params, "meetingId")?;
    to_result(&found(records::get_meeting(conn, &id)?, "meeting")?)
}

fn meetings_update(conn: &Connection, params: &Value) -> HandlerResult {
    let id = get_required_str(params, "meetingId")?;
    let patch: MeetingPatch = parse_params(params.get("patch").unwrap_or(params))?;
    if let Some(status) = patch.status.as_deref() {
        if !matches!(status, "scheduled" | "completed" | "cancelled") {
            return Err(HandlerErr::bad_params(format!("invalid meeting status: {}", status)));
        }
    }
    to_result(&found(records::update_meeting(conn, &id, &patch)?, "meeting")?)
}

fn meetings_delete(conn: &Connection, params: &Value) -> HandlerResult {
    let id = get_required_str(params, "meetingId")?;
    if !records::delete_meeting(conn, &id)? {
        return Err(HandlerErr::not_found("meeting"));
    }
    Ok(json!({ "message": "Meeting deleted" }))
}

fn participation_log(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    class_exists(conn, &class_id)?;
    student_exists(conn, &student_id)?;
    let date = get_optional_str(params, "date")
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(records::today);
    let level = get_optional_str(params, "level").unwrap_or_else(|| "active".to_string());
    let notes = get_optional_str(params, "notes").unwrap_or_default();
    let log = records::insert_participation(conn, &class_id, &student_id, &date, &level, &notes)?;
    to_result(&log)
}

fn participation_for_student(conn: &Connection, params: &Value) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    to_result(&records::participation_for_student(conn, &student_id)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> HandlerResult = match req.method.as_str() {
        "meetings.list" => meetings_list,
        "meetings.schedule" => meetings_schedule,
        "meetings.get" => meetings_get,
        "meetings.update" => meetings_update,
        "meetings.delete" => meetings_delete,
        "participation.log" => participation_log,
        "participation.forStudent" => participation_for_student,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
