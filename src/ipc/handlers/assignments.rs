use crate::ipc::helpers::{
    class_exists, found, get_optional_str, get_required_str, parse_params, student_exists,
    to_result, with_db, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, AssignmentPatch, NewAssignment};
use rusqlite::Connection;
use serde_json::{json, Value};

fn assignments_list(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_optional_str(params, "classId");
    to_result(&records::list_assignments(conn, class_id.as_deref())?)
}

/// Creating an assignment also opens an ungraded placeholder grade for
/// every student already enrolled in the class.
fn assignments_create(conn: &Connection, params: &Value) -> HandlerResult {
    let new: NewAssignment = parse_params(params)?;
    if new.title.trim().is_empty() {
        return Err(HandlerErr::bad_params("missing title"));
    }
    class_exists(conn, &new.class_id)?;
    let (assignment, created_grades) = records::insert_assignment(conn, &new)?;
    tracing::debug!(assignment = %assignment.id, created_grades, "assignment created");
    Ok(json!({ "assignment": assignment, "createdGrades": created_grades }))
}

fn assignments_get(conn: &Connection, params: &Value) -> HandlerResult {
    let assignment_id = get_required_str(params, "assignmentId")?;
    let assignment = found(records::get_assignment(conn, &assignment_id)?, "assignment")?;
    let mut result = to_result(&assignment)?;
    result["submissions"] = to_result(&records::list_submissions(conn, &assignment_id)?)?;
    Ok(result)
}

fn assignments_update(conn: &Connection, params: &Value) -> HandlerResult {
    let assignment_id = get_required_str(params, "assignmentId")?;
    let patch: AssignmentPatch = parse_params(params.get("patch").unwrap_or(params))?;
    to_result(&found(
        records::update_assignment(conn, &assignment_id, &patch)?,
        "assignment",
    )?)
}

fn assignments_submit(conn: &Connection, params: &Value) -> HandlerResult {
    let assignment_id = get_required_str(params, "assignmentId")?;
    let student_id = get_required_str(params, "studentId")?;
    found(records::get_assignment(conn, &assignment_id)?, "assignment")?;
    student_exists(conn, &student_id)?;
    let content = get_optional_str(params, "content").unwrap_or_default();
    let file_url = get_optional_str(params, "fileUrl");
    let submission = records::insert_submission(
        conn,
        &assignment_id,
        &student_id,
        &content,
        file_url.as_deref(),
    )?;
    Ok(json!({ "message": "Submission recorded", "submission": submission }))
}

fn assignments_delete(conn: &Connection, params: &Value) -> HandlerResult {
    let assignment_id = get_required_str(params, "assignmentId")?;
    let removed = found(records::delete_assignment(conn, &assignment_id)?, "assignment")?;
    Ok(json!({ "message": "Assignment deleted", "assignment": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> HandlerResult = match req.method.as_str() {
        "assignments.list" => assignments_list,
        "assignments.create" => assignments_create,
        "assignments.get" => assignments_get,
        "assignments.update" => assignments_update,
        "assignments.submit" => assignments_submit,
        "assignments.delete" => assignments_delete,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
