use crate::ipc::helpers::{
    class_exists, get_optional_str, get_required_str, student_exists, to_result, with_db,
    HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::metrics;
use crate::records::{self, AttendanceFilter, AttendanceStatus, AttendanceTally};
use rusqlite::Connection;
use serde_json::{json, Value};

struct Mark {
    student_id: String,
    status: AttendanceStatus,
    reason: String,
}

fn parse_marks(params: &Value) -> Result<Vec<Mark>, HandlerErr> {
    let Some(rows) = params
        .get("records")
        .or_else(|| params.get("attendanceData"))
        .and_then(|v| v.as_array())
    else {
        return Err(HandlerErr::bad_params("records must be an array"));
    };
    let mut marks = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let student_id = get_required_str(row, "studentId")?;
        let raw = row.get("status").and_then(|v| v.as_str()).unwrap_or("");
        let Some(status) = AttendanceStatus::parse(raw) else {
            return Err(HandlerErr::bad_params(format!("invalid attendance status: {}", raw))
                .with_details(json!({ "index": index })));
        };
        marks.push(Mark {
            student_id,
            status,
            reason: get_optional_str(row, "reason").unwrap_or_default(),
        });
    }
    Ok(marks)
}

/// Marks a batch of students for one day. Re-marking a student on the same
/// date overwrites the earlier record.
fn attendance_mark(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    class_exists(conn, &class_id)?;
    let date = get_optional_str(params, "date")
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(records::today);
    let marks = parse_marks(params)?;
    for m in &marks {
        student_exists(conn, &m.student_id)?;
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let mut saved = Vec::with_capacity(marks.len());
    for m in &marks {
        saved.push(records::upsert_attendance(
            &tx,
            &class_id,
            &m.student_id,
            &date,
            m.status,
            &m.reason,
        )?);
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({ "marked": saved.len(), "records": saved }))
}

fn attendance_list(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_optional_str(params, "classId");
    let student_id = get_optional_str(params, "studentId");
    let date = get_optional_str(params, "date");
    let rows = records::list_attendance(
        conn,
        AttendanceFilter {
            class_id: class_id.as_deref(),
            student_id: student_id.as_deref(),
            date: date.as_deref(),
        },
    )?;
    to_result(&rows)
}

fn attendance_student_report(conn: &Connection, params: &Value) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    student_exists(conn, &student_id)?;
    let rows = records::list_attendance(
        conn,
        AttendanceFilter {
            student_id: Some(&student_id),
            ..Default::default()
        },
    )?;
    let tally = AttendanceTally::from_records(&rows);
    let recent = &rows[rows.len().saturating_sub(20)..];
    Ok(json!({
        "studentId": student_id,
        "total": tally.total,
        "present": tally.present,
        "absent": tally.absent,
        "late": tally.late,
        "excused": tally.excused,
        "attendancePercentage": metrics::rate(tally.present, tally.total, 0.0),
        "recentRecords": recent,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> HandlerResult = match req.method.as_str() {
        "attendance.mark" => attendance_mark,
        "attendance.list" => attendance_list,
        "attendance.studentReport" => attendance_student_report,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
