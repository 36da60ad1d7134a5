use crate::ipc::helpers::{
    found, get_required_str, parse_params, to_result, with_db, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::metrics;
use crate::records::{self, AttendanceFilter, AttendanceStatus, ClassPatch, NewClass};
use rusqlite::Connection;
use serde_json::{json, Value};

fn classes_list(conn: &Connection, _params: &Value) -> HandlerResult {
    to_result(&records::list_classes(conn)?)
}

fn classes_create(conn: &Connection, params: &Value) -> HandlerResult {
    let new: NewClass = parse_params(params)?;
    if new.name.trim().is_empty() {
        return Err(HandlerErr::bad_params("missing name"));
    }
    to_result(&records::insert_class(conn, &new)?)
}

/// The class plus enrolment and attendance figures.
fn classes_get(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let class = found(records::get_class(conn, &class_id)?, "class")?;
    let students = records::list_students(conn, Some(&class_id))?;
    let attendance = records::list_attendance(
        conn,
        AttendanceFilter {
            class_id: Some(&class_id),
            ..Default::default()
        },
    )?;
    let present = attendance
        .iter()
        .filter(|a| a.status == AttendanceStatus::Present)
        .count();

    let mut result = to_result(&class)?;
    result["studentCount"] = json!(students.len());
    result["assignmentCount"] = json!(records::list_assignments(conn, Some(&class_id))?.len());
    result["avgAttendanceRate"] = json!(metrics::rate(present, attendance.len(), 0.0));
    result["topStudent"] = to_result(&students.first())?;
    Ok(result)
}

fn classes_update(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let patch: ClassPatch = parse_params(params.get("patch").unwrap_or(params))?;
    to_result(&found(records::update_class(conn, &class_id, &patch)?, "class")?)
}

fn classes_delete(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    if !records::delete_class(conn, &class_id)? {
        return Err(HandlerErr::not_found("class"));
    }
    tracing::info!(class = %class_id, "class deleted");
    Ok(json!({ "message": "Class deleted" }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> HandlerResult = match req.method.as_str() {
        "classes.list" => classes_list,
        "classes.create" => classes_create,
        "classes.get" => classes_get,
        "classes.update" => classes_update,
        "classes.delete" => classes_delete,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
