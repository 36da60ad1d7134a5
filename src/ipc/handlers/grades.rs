use crate::ipc::helpers::{
    class_exists, found, get_optional_str, get_required_str, parse_params, student_exists,
    to_result, with_db, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::metrics;
use crate::records::{self, GradeFilter, GradePatch, NewGrade};
use rusqlite::Connection;
use serde_json::{json, Value};

fn grades_list(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_optional_str(params, "classId");
    let assignment_id = get_optional_str(params, "assignmentId");
    let rows = records::list_grades(
        conn,
        GradeFilter {
            class_id: class_id.as_deref(),
            assignment_id: assignment_id.as_deref(),
            ..Default::default()
        },
    )?;
    to_result(&rows)
}

/// Every grade row of one student, placeholders included, with the mean of
/// the marks actually entered.
fn grades_for_student(conn: &Connection, params: &Value) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    student_exists(conn, &student_id)?;
    let grades = records::list_grades(
        conn,
        GradeFilter {
            student_id: Some(&student_id),
            ..Default::default()
        },
    )?;
    let marks: Vec<f64> = grades.iter().filter_map(|g| g.marks_obtained).collect();
    Ok(json!({
        "grades": grades,
        "average": metrics::average(&marks).round(),
    }))
}

fn grades_create(conn: &Connection, params: &Value) -> HandlerResult {
    let new: NewGrade = parse_params(params)?;
    class_exists(conn, &new.class_id)?;
    student_exists(conn, &new.student_id)?;
    found(records::get_assignment(conn, &new.assignment_id)?, "assignment")?;
    to_result(&records::insert_grade(conn, &new)?)
}

fn grades_update(conn: &Connection, params: &Value) -> HandlerResult {
    let grade_id = get_required_str(params, "gradeId")?;
    let patch: GradePatch = parse_params(params.get("patch").unwrap_or(params))?;
    to_result(&found(records::update_grade(conn, &grade_id, &patch)?, "grade")?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> HandlerResult = match req.method.as_str() {
        "grades.list" => grades_list,
        "grades.forStudent" => grades_for_student,
        "grades.create" => grades_create,
        "grades.update" => grades_update,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
