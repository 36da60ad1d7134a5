use crate::ipc::helpers::{
    class_exists, found, get_optional_str, get_required_str, parse_params, to_result, with_db,
    HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::metrics;
use crate::records::{self, AttendanceFilter, AttendanceStatus, NewStudent, StudentPatch};
use rusqlite::Connection;
use serde_json::{json, Value};

fn students_list(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_optional_str(params, "classId");
    to_result(&records::list_students(conn, class_id.as_deref())?)
}

fn students_create(conn: &Connection, params: &Value) -> HandlerResult {
    let new: NewStudent = parse_params(params)?;
    if new.class_id.is_empty() {
        return Err(HandlerErr::bad_params("missing classId"));
    }
    class_exists(conn, &new.class_id)?;
    to_result(&records::insert_student(conn, &new)?)
}

/// Bulk enrolment from an uploaded roster: `students` is an array of
/// `{ name, rollNo, email, phone }`.
fn students_import(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    class_exists(conn, &class_id)?;
    let Some(rows) = params.get("students").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("students must be an array"));
    };
    let mut batch = Vec::with_capacity(rows.len());
    for row in rows {
        let mut new: NewStudent = parse_params(row)?;
        new.class_id = class_id.clone();
        batch.push(new);
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let mut imported = Vec::with_capacity(batch.len());
    for new in &batch {
        imported.push(records::insert_student(&tx, new)?);
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    tracing::info!(class = %class_id, count = imported.len(), "students imported");
    Ok(json!({ "imported": imported.len(), "students": imported }))
}

/// Student record with attendance rate, mean of graded marks and the last
/// ten attendance entries.
fn students_get(conn: &Connection, params: &Value) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    let student = found(records::get_student(conn, &student_id)?, "student")?;
    let attendance = records::list_attendance(
        conn,
        AttendanceFilter {
            student_id: Some(&student_id),
            ..Default::default()
        },
    )?;
    let present = attendance
        .iter()
        .filter(|a| a.status == AttendanceStatus::Present)
        .count();
    let grades = records::list_grades(
        conn,
        records::GradeFilter {
            student_id: Some(&student_id),
            ..Default::default()
        },
    )?;
    let marks: Vec<f64> = grades.iter().filter_map(|g| g.marks_obtained).collect();
    let recent = &attendance[attendance.len().saturating_sub(10)..];

    let mut result = to_result(&student)?;
    result["attendanceRate"] = json!(metrics::rate(present, attendance.len(), 0.0));
    result["avgMarks"] = json!(metrics::average(&marks).round());
    result["totalAssignments"] = json!(grades.len());
    result["attendanceRecords"] = to_result(&recent)?;
    Ok(result)
}

fn students_update(conn: &Connection, params: &Value) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    let patch: StudentPatch = parse_params(params.get("patch").unwrap_or(params))?;
    to_result(&found(
        records::update_student(conn, &student_id, &patch)?,
        "student",
    )?)
}

fn students_delete(conn: &Connection, params: &Value) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    if !records::delete_student(conn, &student_id)? {
        return Err(HandlerErr::not_found("student"));
    }
    Ok(json!({ "message": "Student deleted" }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> HandlerResult = match req.method.as_str() {
        "students.list" => students_list,
        "students.create" => students_create,
        "students.import" => students_import,
        "students.get" => students_get,
        "students.update" => students_update,
        "students.delete" => students_delete,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
