//! Record store: typed rows for every collection plus the exact-match
//! filter / find / insert / update / delete operations the request layer and
//! the analytics modules use. Every function takes the store handle
//! explicitly.

use crate::error::{Error, Result};
use chrono::SecondsFormat;
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// RFC 3339 UTC timestamp; sorts lexicographically.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Runs `base_sql` with an `AND`-joined exact-match clause for every filter
/// that carries a value.
fn filtered_query<T>(
    conn: &Connection,
    base_sql: &str,
    filters: &[(&str, Option<&str>)],
    order_by: &str,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut sql = base_sql.to_string();
    let mut clauses = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    for (column, value) in filters {
        if let Some(v) = value {
            clauses.push(format!("{} = ?", column));
            values.push(Value::Text(v.to_string()));
        }
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(order_by);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), map)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// ==================== CLASSES ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    pub section: String,
    pub subject: String,
    pub teacher: String,
    pub capacity: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub name: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default = "default_capacity")]
    pub capacity: i64,
}

fn default_capacity() -> i64 {
    40
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPatch {
    pub name: Option<String>,
    pub section: Option<String>,
    pub subject: Option<String>,
    pub teacher: Option<String>,
    pub capacity: Option<i64>,
}

const CLASS_COLUMNS: &str = "SELECT id, name, section, subject, teacher, capacity, created_at FROM classes";

fn class_from_row(r: &Row<'_>) -> rusqlite::Result<Class> {
    Ok(Class {
        id: r.get(0)?,
        name: r.get(1)?,
        section: r.get(2)?,
        subject: r.get(3)?,
        teacher: r.get(4)?,
        capacity: r.get(5)?,
        created_at: r.get(6)?,
    })
}

pub fn insert_class(conn: &Connection, new: &NewClass) -> Result<Class> {
    let class = Class {
        id: new_id(),
        name: new.name.clone(),
        section: new.section.clone(),
        subject: new.subject.clone(),
        teacher: new.teacher.clone(),
        capacity: new.capacity,
        created_at: now_timestamp(),
    };
    conn.execute(
        "INSERT INTO classes(id, name, section, subject, teacher, capacity, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            class.id,
            class.name,
            class.section,
            class.subject,
            class.teacher,
            class.capacity,
            class.created_at
        ],
    )?;
    Ok(class)
}

pub fn get_class(conn: &Connection, class_id: &str) -> Result<Option<Class>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?", CLASS_COLUMNS),
            [class_id],
            class_from_row,
        )
        .optional()?)
}

pub fn list_classes(conn: &Connection) -> Result<Vec<Class>> {
    filtered_query(conn, CLASS_COLUMNS, &[], "rowid", class_from_row)
}

pub fn update_class(conn: &Connection, class_id: &str, patch: &ClassPatch) -> Result<Option<Class>> {
    let Some(mut class) = get_class(conn, class_id)? else {
        return Ok(None);
    };
    if let Some(v) = &patch.name {
        class.name = v.clone();
    }
    if let Some(v) = &patch.section {
        class.section = v.clone();
    }
    if let Some(v) = &patch.subject {
        class.subject = v.clone();
    }
    if let Some(v) = &patch.teacher {
        class.teacher = v.clone();
    }
    if let Some(v) = patch.capacity {
        class.capacity = v;
    }
    conn.execute(
        "UPDATE classes SET name = ?, section = ?, subject = ?, teacher = ?, capacity = ? WHERE id = ?",
        params![
            class.name,
            class.section,
            class.subject,
            class.teacher,
            class.capacity,
            class.id
        ],
    )?;
    Ok(Some(class))
}

/// Deletes a class and every record hanging off it. Returns false when the
/// class does not exist.
pub fn delete_class(conn: &Connection, class_id: &str) -> Result<bool> {
    if get_class(conn, class_id)?.is_none() {
        return Ok(false);
    }
    let tx = conn.unchecked_transaction()?;
    // Explicit dependency order; the schema has no ON DELETE CASCADE.
    tx.execute(
        "DELETE FROM submissions
         WHERE assignment_id IN (SELECT id FROM assignments WHERE class_id = ?)",
        [class_id],
    )?;
    tx.execute("DELETE FROM grades WHERE class_id = ?", [class_id])?;
    tx.execute("DELETE FROM assignments WHERE class_id = ?", [class_id])?;
    tx.execute("DELETE FROM attendance WHERE class_id = ?", [class_id])?;
    tx.execute("DELETE FROM participation_logs WHERE class_id = ?", [class_id])?;
    tx.execute("DELETE FROM students WHERE class_id = ?", [class_id])?;
    tx.execute("DELETE FROM classes WHERE id = ?", [class_id])?;
    tx.commit()?;
    Ok(true)
}

// ==================== STUDENTS ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub class_id: String,
    pub name: String,
    pub roll_no: String,
    pub email: String,
    pub phone: String,
    pub notes: String,
    pub enrolled_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    #[serde(default)]
    pub class_id: String,
    pub name: String,
    #[serde(default)]
    pub roll_no: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    pub name: Option<String>,
    pub roll_no: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

const STUDENT_COLUMNS: &str =
    "SELECT id, class_id, name, roll_no, email, phone, notes, enrolled_at FROM students";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        class_id: r.get(1)?,
        name: r.get(2)?,
        roll_no: r.get(3)?,
        email: r.get(4)?,
        phone: r.get(5)?,
        notes: r.get(6)?,
        enrolled_at: r.get(7)?,
    })
}

pub fn insert_student(conn: &Connection, new: &NewStudent) -> Result<Student> {
    let student = Student {
        id: new_id(),
        class_id: new.class_id.clone(),
        name: new.name.clone(),
        roll_no: new.roll_no.clone(),
        email: new.email.clone(),
        phone: new.phone.clone(),
        notes: new.notes.clone(),
        enrolled_at: now_timestamp(),
    };
    conn.execute(
        "INSERT INTO students(id, class_id, name, roll_no, email, phone, notes, enrolled_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            student.id,
            student.class_id,
            student.name,
            student.roll_no,
            student.email,
            student.phone,
            student.notes,
            student.enrolled_at
        ],
    )?;
    Ok(student)
}

pub fn get_student(conn: &Connection, student_id: &str) -> Result<Option<Student>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?", STUDENT_COLUMNS),
            [student_id],
            student_from_row,
        )
        .optional()?)
}

/// Students in enrolment order, optionally restricted to one class.
pub fn list_students(conn: &Connection, class_id: Option<&str>) -> Result<Vec<Student>> {
    filtered_query(
        conn,
        STUDENT_COLUMNS,
        &[("class_id", class_id)],
        "rowid",
        student_from_row,
    )
}

pub fn update_student(
    conn: &Connection,
    student_id: &str,
    patch: &StudentPatch,
) -> Result<Option<Student>> {
    let Some(mut student) = get_student(conn, student_id)? else {
        return Ok(None);
    };
    if let Some(v) = &patch.name {
        student.name = v.clone();
    }
    if let Some(v) = &patch.roll_no {
        student.roll_no = v.clone();
    }
    if let Some(v) = &patch.email {
        student.email = v.clone();
    }
    if let Some(v) = &patch.phone {
        student.phone = v.clone();
    }
    if let Some(v) = &patch.notes {
        student.notes = v.clone();
    }
    conn.execute(
        "UPDATE students SET name = ?, roll_no = ?, email = ?, phone = ?, notes = ? WHERE id = ?",
        params![
            student.name,
            student.roll_no,
            student.email,
            student.phone,
            student.notes,
            student.id
        ],
    )?;
    Ok(Some(student))
}

pub fn delete_student(conn: &Connection, student_id: &str) -> Result<bool> {
    if get_student(conn, student_id)?.is_none() {
        return Ok(false);
    }
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM grades WHERE student_id = ?", [student_id])?;
    tx.execute("DELETE FROM attendance WHERE student_id = ?", [student_id])?;
    tx.execute("DELETE FROM participation_logs WHERE student_id = ?", [student_id])?;
    tx.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    tx.commit()?;
    Ok(true)
}

// ==================== ATTENDANCE ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            "excused" => Some(AttendanceStatus::Excused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub class_id: String,
    pub student_id: String,
    pub date: String,
    pub status: AttendanceStatus,
    pub reason: String,
    pub recorded_at: String,
}

const ATTENDANCE_COLUMNS: &str =
    "SELECT id, class_id, student_id, date, status, reason, recorded_at FROM attendance";

fn attendance_from_row(r: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let raw_status: String = r.get(4)?;
    Ok(AttendanceRecord {
        id: r.get(0)?,
        class_id: r.get(1)?,
        student_id: r.get(2)?,
        date: r.get(3)?,
        status: AttendanceStatus::parse(&raw_status).unwrap_or(AttendanceStatus::Absent),
        reason: r.get(5)?,
        recorded_at: r.get(6)?,
    })
}

/// One record per (class, student, date): marking the same day again
/// overwrites status and reason.
pub fn upsert_attendance(
    conn: &Connection,
    class_id: &str,
    student_id: &str,
    date: &str,
    status: AttendanceStatus,
    reason: &str,
) -> Result<AttendanceRecord> {
    let recorded_at = now_timestamp();
    conn.execute(
        "INSERT INTO attendance(id, class_id, student_id, date, status, reason, recorded_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(class_id, student_id, date) DO UPDATE SET
           status = excluded.status,
           reason = excluded.reason,
           recorded_at = excluded.recorded_at",
        params![
            new_id(),
            class_id,
            student_id,
            date,
            status.as_str(),
            reason,
            recorded_at
        ],
    )?;
    let record = conn.query_row(
        &format!(
            "{} WHERE class_id = ? AND student_id = ? AND date = ?",
            ATTENDANCE_COLUMNS
        ),
        params![class_id, student_id, date],
        attendance_from_row,
    )?;
    Ok(record)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AttendanceFilter<'a> {
    pub class_id: Option<&'a str>,
    pub student_id: Option<&'a str>,
    pub date: Option<&'a str>,
}

pub fn list_attendance(conn: &Connection, filter: AttendanceFilter<'_>) -> Result<Vec<AttendanceRecord>> {
    filtered_query(
        conn,
        ATTENDANCE_COLUMNS,
        &[
            ("class_id", filter.class_id),
            ("student_id", filter.student_id),
            ("date", filter.date),
        ],
        "rowid",
        attendance_from_row,
    )
}

/// Per-status counts over a set of attendance records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTally {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
}

impl AttendanceTally {
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        let mut tally = AttendanceTally::default();
        for r in records {
            tally.total += 1;
            match r.status {
                AttendanceStatus::Present => tally.present += 1,
                AttendanceStatus::Absent => tally.absent += 1,
                AttendanceStatus::Late => tally.late += 1,
                AttendanceStatus::Excused => tally.excused += 1,
            }
        }
        tally
    }
}

pub fn attendance_tally_for_student(conn: &Connection, student_id: &str) -> Result<AttendanceTally> {
    let records = list_attendance(
        conn,
        AttendanceFilter {
            student_id: Some(student_id),
            ..Default::default()
        },
    )?;
    Ok(AttendanceTally::from_records(&records))
}

// ==================== ASSIGNMENTS ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentKind {
    #[default]
    Assignment,
    Quiz,
}

impl AssignmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentKind::Assignment => "assignment",
            AssignmentKind::Quiz => "quiz",
        }
    }

    pub(crate) fn from_db(raw: &str) -> Self {
        if raw == "quiz" {
            AssignmentKind::Quiz
        } else {
            AssignmentKind::Assignment
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub class_id: String,
    pub title: String,
    pub description: String,
    pub due_date: Option<String>,
    pub total_marks: f64,
    #[serde(rename = "type")]
    pub kind: AssignmentKind,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    #[serde(default)]
    pub class_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub total_marks: Option<f64>,
    #[serde(default, rename = "type")]
    pub kind: Option<AssignmentKind>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub total_marks: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<AssignmentKind>,
}

const ASSIGNMENT_COLUMNS: &str = "SELECT id, class_id, title, description, due_date, total_marks, kind, created_at FROM assignments";

fn assignment_from_row(r: &Row<'_>) -> rusqlite::Result<Assignment> {
    let kind: String = r.get(6)?;
    Ok(Assignment {
        id: r.get(0)?,
        class_id: r.get(1)?,
        title: r.get(2)?,
        description: r.get(3)?,
        due_date: r.get(4)?,
        total_marks: r.get(5)?,
        kind: AssignmentKind::from_db(&kind),
        created_at: r.get(7)?,
    })
}

/// Inserts the assignment and one ungraded placeholder grade per student
/// enrolled in its class. Returns the assignment and the placeholder count.
pub fn insert_assignment(conn: &Connection, new: &NewAssignment) -> Result<(Assignment, usize)> {
    let assignment = Assignment {
        id: new_id(),
        class_id: new.class_id.clone(),
        title: new.title.clone(),
        description: new.description.clone(),
        due_date: new.due_date.clone(),
        total_marks: new.total_marks.filter(|m| *m > 0.0).unwrap_or(100.0),
        kind: new.kind.unwrap_or_default(),
        created_at: now_timestamp(),
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO assignments(id, class_id, title, description, due_date, total_marks, kind, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            assignment.id,
            assignment.class_id,
            assignment.title,
            assignment.description,
            assignment.due_date,
            assignment.total_marks,
            assignment.kind.as_str(),
            assignment.created_at
        ],
    )?;
    let students = list_students(&tx, Some(&assignment.class_id))?;
    for s in &students {
        tx.execute(
            "INSERT INTO grades(id, class_id, student_id, assignment_id, marks_obtained, feedback, graded_at)
             VALUES(?, ?, ?, ?, NULL, '', ?)",
            params![new_id(), assignment.class_id, s.id, assignment.id, assignment.created_at],
        )?;
    }
    tx.commit()?;
    Ok((assignment, students.len()))
}

pub fn get_assignment(conn: &Connection, assignment_id: &str) -> Result<Option<Assignment>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?", ASSIGNMENT_COLUMNS),
            [assignment_id],
            assignment_from_row,
        )
        .optional()?)
}

pub fn list_assignments(conn: &Connection, class_id: Option<&str>) -> Result<Vec<Assignment>> {
    filtered_query(
        conn,
        ASSIGNMENT_COLUMNS,
        &[("class_id", class_id)],
        "rowid",
        assignment_from_row,
    )
}

pub fn update_assignment(
    conn: &Connection,
    assignment_id: &str,
    patch: &AssignmentPatch,
) -> Result<Option<Assignment>> {
    let Some(mut a) = get_assignment(conn, assignment_id)? else {
        return Ok(None);
    };
    if let Some(v) = &patch.title {
        a.title = v.clone();
    }
    if let Some(v) = &patch.description {
        a.description = v.clone();
    }
    if let Some(v) = &patch.due_date {
        a.due_date = Some(v.clone());
    }
    if let Some(v) = patch.total_marks.filter(|m| *m > 0.0) {
        a.total_marks = v;
    }
    if let Some(v) = patch.kind {
        a.kind = v;
    }
    conn.execute(
        "UPDATE assignments SET title = ?, description = ?, due_date = ?, total_marks = ?, kind = ? WHERE id = ?",
        params![
            a.title,
            a.description,
            a.due_date,
            a.total_marks,
            a.kind.as_str(),
            a.id
        ],
    )?;
    Ok(Some(a))
}

/// Removes the assignment together with its grades and submissions.
pub fn delete_assignment(conn: &Connection, assignment_id: &str) -> Result<Option<Assignment>> {
    let Some(a) = get_assignment(conn, assignment_id)? else {
        return Ok(None);
    };
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM grades WHERE assignment_id = ?", [assignment_id])?;
    tx.execute("DELETE FROM submissions WHERE assignment_id = ?", [assignment_id])?;
    tx.execute("DELETE FROM assignments WHERE id = ?", [assignment_id])?;
    tx.commit()?;
    Ok(Some(a))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    pub content: String,
    pub file_url: Option<String>,
    pub submitted_at: String,
}

pub fn insert_submission(
    conn: &Connection,
    assignment_id: &str,
    student_id: &str,
    content: &str,
    file_url: Option<&str>,
) -> Result<Submission> {
    let s = Submission {
        id: new_id(),
        assignment_id: assignment_id.to_string(),
        student_id: student_id.to_string(),
        content: content.to_string(),
        file_url: file_url.map(str::to_string),
        submitted_at: now_timestamp(),
    };
    conn.execute(
        "INSERT INTO submissions(id, assignment_id, student_id, content, file_url, submitted_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![s.id, s.assignment_id, s.student_id, s.content, s.file_url, s.submitted_at],
    )?;
    Ok(s)
}

pub fn list_submissions(conn: &Connection, assignment_id: &str) -> Result<Vec<Submission>> {
    filtered_query(
        conn,
        "SELECT id, assignment_id, student_id, content, file_url, submitted_at FROM submissions",
        &[("assignment_id", Some(assignment_id))],
        "rowid",
        |r| {
            Ok(Submission {
                id: r.get(0)?,
                assignment_id: r.get(1)?,
                student_id: r.get(2)?,
                content: r.get(3)?,
                file_url: r.get(4)?,
                submitted_at: r.get(5)?,
            })
        },
    )
}

// ==================== GRADES ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub class_id: String,
    pub student_id: String,
    pub assignment_id: String,
    pub marks_obtained: Option<f64>,
    pub feedback: String,
    pub graded_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGrade {
    pub class_id: String,
    pub student_id: String,
    pub assignment_id: String,
    #[serde(default)]
    pub marks_obtained: Option<f64>,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradePatch {
    pub marks_obtained: Option<f64>,
    pub feedback: Option<String>,
}

const GRADE_COLUMNS: &str = "SELECT id, class_id, student_id, assignment_id, marks_obtained, feedback, graded_at FROM grades";

fn grade_from_row(r: &Row<'_>) -> rusqlite::Result<Grade> {
    Ok(Grade {
        id: r.get(0)?,
        class_id: r.get(1)?,
        student_id: r.get(2)?,
        assignment_id: r.get(3)?,
        marks_obtained: r.get(4)?,
        feedback: r.get(5)?,
        graded_at: r.get(6)?,
    })
}

pub fn insert_grade(conn: &Connection, new: &NewGrade) -> Result<Grade> {
    let g = Grade {
        id: new_id(),
        class_id: new.class_id.clone(),
        student_id: new.student_id.clone(),
        assignment_id: new.assignment_id.clone(),
        marks_obtained: new.marks_obtained,
        feedback: new.feedback.clone(),
        graded_at: now_timestamp(),
    };
    conn.execute(
        "INSERT INTO grades(id, class_id, student_id, assignment_id, marks_obtained, feedback, graded_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            g.id,
            g.class_id,
            g.student_id,
            g.assignment_id,
            g.marks_obtained,
            g.feedback,
            g.graded_at
        ],
    )?;
    Ok(g)
}

pub fn get_grade(conn: &Connection, grade_id: &str) -> Result<Option<Grade>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?", GRADE_COLUMNS),
            [grade_id],
            grade_from_row,
        )
        .optional()?)
}

/// Setting marks stamps `gradedAt` with the current time.
pub fn update_grade(conn: &Connection, grade_id: &str, patch: &GradePatch) -> Result<Option<Grade>> {
    let Some(mut g) = get_grade(conn, grade_id)? else {
        return Ok(None);
    };
    if let Some(m) = patch.marks_obtained {
        g.marks_obtained = Some(m);
        g.graded_at = now_timestamp();
    }
    if let Some(f) = &patch.feedback {
        g.feedback = f.clone();
    }
    conn.execute(
        "UPDATE grades SET marks_obtained = ?, feedback = ?, graded_at = ? WHERE id = ?",
        params![g.marks_obtained, g.feedback, g.graded_at, g.id],
    )?;
    Ok(Some(g))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GradeFilter<'a> {
    pub class_id: Option<&'a str>,
    pub student_id: Option<&'a str>,
    pub assignment_id: Option<&'a str>,
}

pub fn list_grades(conn: &Connection, filter: GradeFilter<'_>) -> Result<Vec<Grade>> {
    filtered_query(
        conn,
        GRADE_COLUMNS,
        &[
            ("class_id", filter.class_id),
            ("student_id", filter.student_id),
            ("assignment_id", filter.assignment_id),
        ],
        "rowid",
        grade_from_row,
    )
}

/// A graded mark joined with its assignment. Placeholders (null marks) never
/// appear here.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedWork {
    pub grade_id: String,
    pub student_id: String,
    pub assignment_id: String,
    pub topic: String,
    pub marks: f64,
    pub total_marks: f64,
    pub feedback: String,
    pub graded_at: String,
}

impl GradedWork {
    pub fn percent(&self) -> f64 {
        crate::metrics::percent_of(self.marks, self.total_marks)
    }
}

fn graded_work_from_row(r: &Row<'_>) -> rusqlite::Result<GradedWork> {
    Ok(GradedWork {
        grade_id: r.get(0)?,
        student_id: r.get(1)?,
        assignment_id: r.get(2)?,
        marks: r.get(3)?,
        feedback: r.get(4)?,
        graded_at: r.get(5)?,
        topic: r.get(6)?,
        total_marks: r.get(7)?,
    })
}

const GRADED_WORK_SQL: &str = "SELECT g.id, g.student_id, g.assignment_id, g.marks_obtained, g.feedback, g.graded_at, a.title, a.total_marks
     FROM grades g
     JOIN assignments a ON a.id = g.assignment_id
     WHERE g.marks_obtained IS NOT NULL";

pub fn graded_work_for_student(conn: &Connection, student_id: &str) -> Result<Vec<GradedWork>> {
    let mut stmt = conn.prepare(&format!(
        "{} AND g.student_id = ? ORDER BY g.rowid",
        GRADED_WORK_SQL
    ))?;
    let rows = stmt
        .query_map([student_id], graded_work_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn graded_work_for_class(conn: &Connection, class_id: &str) -> Result<Vec<GradedWork>> {
    let mut stmt = conn.prepare(&format!(
        "{} AND g.class_id = ? ORDER BY g.rowid",
        GRADED_WORK_SQL
    ))?;
    let rows = stmt
        .query_map([class_id], graded_work_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// ==================== COMMUNICATIONS ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationKind {
    #[default]
    Message,
    Announcement,
    Reminder,
}

impl CommunicationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommunicationKind::Message => "message",
            CommunicationKind::Announcement => "announcement",
            CommunicationKind::Reminder => "reminder",
        }
    }

    pub(crate) fn from_db(raw: &str) -> Self {
        match raw {
            "announcement" => CommunicationKind::Announcement,
            "reminder" => CommunicationKind::Reminder,
            _ => CommunicationKind::Message,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Communication {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: CommunicationKind,
    pub read: bool,
    pub sent_at: String,
}

const COMMUNICATION_COLUMNS: &str =
    "SELECT id, sender_id, receiver_id, message, kind, read, sent_at FROM communications";

fn communication_from_row(r: &Row<'_>) -> rusqlite::Result<Communication> {
    let kind: String = r.get(4)?;
    Ok(Communication {
        id: r.get(0)?,
        sender_id: r.get(1)?,
        receiver_id: r.get(2)?,
        message: r.get(3)?,
        kind: CommunicationKind::from_db(&kind),
        read: r.get::<_, i64>(5)? != 0,
        sent_at: r.get(6)?,
    })
}

pub fn insert_communication(
    conn: &Connection,
    sender_id: &str,
    receiver_id: &str,
    message: &str,
    kind: CommunicationKind,
) -> Result<Communication> {
    let c = Communication {
        id: new_id(),
        sender_id: sender_id.to_string(),
        receiver_id: receiver_id.to_string(),
        message: message.to_string(),
        kind,
        read: false,
        sent_at: now_timestamp(),
    };
    conn.execute(
        "INSERT INTO communications(id, sender_id, receiver_id, message, kind, read, sent_at)
         VALUES(?, ?, ?, ?, ?, 0, ?)",
        params![c.id, c.sender_id, c.receiver_id, c.message, c.kind.as_str(), c.sent_at],
    )?;
    Ok(c)
}

pub fn list_communications(conn: &Connection) -> Result<Vec<Communication>> {
    filtered_query(conn, COMMUNICATION_COLUMNS, &[], "rowid", communication_from_row)
}

/// Messages sent or received by `user_id`.
pub fn messages_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Communication>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE sender_id = ?1 OR receiver_id = ?1 ORDER BY rowid",
        COMMUNICATION_COLUMNS
    ))?;
    let rows = stmt
        .query_map([user_id], communication_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn announcements_for_class(conn: &Connection, class_id: &str) -> Result<Vec<Communication>> {
    filtered_query(
        conn,
        COMMUNICATION_COLUMNS,
        &[
            ("kind", Some(CommunicationKind::Announcement.as_str())),
            ("receiver_id", Some(class_id)),
        ],
        "rowid",
        communication_from_row,
    )
}

pub fn delete_communication(conn: &Connection, id: &str) -> Result<bool> {
    Ok(conn.execute("DELETE FROM communications WHERE id = ?", [id])? > 0)
}

// ==================== RESOURCES ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub class_id: Option<String>,
    pub title: String,
    pub category: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewResource {
    #[serde(default)]
    pub class_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

const RESOURCE_COLUMNS: &str =
    "SELECT id, class_id, title, category, url, kind, uploaded_at FROM resources";

fn resource_from_row(r: &Row<'_>) -> rusqlite::Result<Resource> {
    Ok(Resource {
        id: r.get(0)?,
        class_id: r.get(1)?,
        title: r.get(2)?,
        category: r.get(3)?,
        url: r.get(4)?,
        kind: r.get(5)?,
        uploaded_at: r.get(6)?,
    })
}

pub fn insert_resource(conn: &Connection, new: &NewResource) -> Result<Resource> {
    let res = Resource {
        id: new_id(),
        class_id: new.class_id.clone(),
        title: new.title.clone(),
        category: new.category.clone(),
        url: new.url.clone(),
        kind: new.kind.clone().unwrap_or_else(|| "pdf".to_string()),
        uploaded_at: now_timestamp(),
    };
    conn.execute(
        "INSERT INTO resources(id, class_id, title, category, url, kind, uploaded_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            res.id,
            res.class_id,
            res.title,
            res.category,
            res.url,
            res.kind,
            res.uploaded_at
        ],
    )?;
    Ok(res)
}

pub fn get_resource(conn: &Connection, id: &str) -> Result<Option<Resource>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?", RESOURCE_COLUMNS),
            [id],
            resource_from_row,
        )
        .optional()?)
}

pub fn list_resources(conn: &Connection, class_id: Option<&str>) -> Result<Vec<Resource>> {
    filtered_query(
        conn,
        RESOURCE_COLUMNS,
        &[("class_id", class_id)],
        "rowid",
        resource_from_row,
    )
}

pub fn update_resource(conn: &Connection, id: &str, patch: &ResourcePatch) -> Result<Option<Resource>> {
    let Some(mut res) = get_resource(conn, id)? else {
        return Ok(None);
    };
    if let Some(v) = &patch.title {
        res.title = v.clone();
    }
    if let Some(v) = &patch.category {
        res.category = v.clone();
    }
    if let Some(v) = &patch.url {
        res.url = v.clone();
    }
    if let Some(v) = &patch.kind {
        res.kind = v.clone();
    }
    conn.execute(
        "UPDATE resources SET title = ?, category = ?, url = ?, kind = ? WHERE id = ?",
        params![res.title, res.category, res.url, res.kind, res.id],
    )?;
    Ok(Some(res))
}

pub fn delete_resource(conn: &Connection, id: &str) -> Result<bool> {
    Ok(conn.execute("DELETE FROM resources WHERE id = ?", [id])? > 0)
}

// ==================== PARTICIPATION ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipationLog {
    pub id: String,
    pub class_id: String,
    pub student_id: String,
    pub date: String,
    pub level: String,
    pub notes: String,
    pub recorded_at: String,
}

pub fn insert_participation(
    conn: &Connection,
    class_id: &str,
    student_id: &str,
    date: &str,
    level: &str,
    notes: &str,
) -> Result<ParticipationLog> {
    let log = ParticipationLog {
        id: new_id(),
        class_id: class_id.to_string(),
        student_id: student_id.to_string(),
        date: date.to_string(),
        level: level.to_string(),
        notes: notes.to_string(),
        recorded_at: now_timestamp(),
    };
    conn.execute(
        "INSERT INTO participation_logs(id, class_id, student_id, date, level, notes, recorded_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            log.id,
            log.class_id,
            log.student_id,
            log.date,
            log.level,
            log.notes,
            log.recorded_at
        ],
    )?;
    Ok(log)
}

pub fn participation_for_student(conn: &Connection, student_id: &str) -> Result<Vec<ParticipationLog>> {
    list_participation(conn, Some(student_id))
}

pub fn list_participation(conn: &Connection, student_id: Option<&str>) -> Result<Vec<ParticipationLog>> {
    filtered_query(
        conn,
        "SELECT id, class_id, student_id, date, level, notes, recorded_at FROM participation_logs",
        &[("student_id", student_id)],
        "rowid",
        |r| {
            Ok(ParticipationLog {
                id: r.get(0)?,
                class_id: r.get(1)?,
                student_id: r.get(2)?,
                date: r.get(3)?,
                level: r.get(4)?,
                notes: r.get(5)?,
                recorded_at: r.get(6)?,
            })
        },
    )
}

// ==================== MEETINGS ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub class_id: String,
    pub student_id: String,
    pub parent_name: String,
    pub scheduled_date: String,
    pub status: String,
    pub notes: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeeting {
    #[serde(default)]
    pub class_id: String,
    pub student_id: String,
    #[serde(default)]
    pub parent_name: String,
    #[serde(default)]
    pub scheduled_date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingPatch {
    pub parent_name: Option<String>,
    pub scheduled_date: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

const MEETING_COLUMNS: &str = "SELECT id, class_id, student_id, parent_name, scheduled_date, status, notes, created_at FROM meetings";

fn meeting_from_row(r: &Row<'_>) -> rusqlite::Result<Meeting> {
    Ok(Meeting {
        id: r.get(0)?,
        class_id: r.get(1)?,
        student_id: r.get(2)?,
        parent_name: r.get(3)?,
        scheduled_date: r.get(4)?,
        status: r.get(5)?,
        notes: r.get(6)?,
        created_at: r.get(7)?,
    })
}

pub fn insert_meeting(conn: &Connection, new: &NewMeeting) -> Result<Meeting> {
    let m = Meeting {
        id: new_id(),
        class_id: new.class_id.clone(),
        student_id: new.student_id.clone(),
        parent_name: new.parent_name.clone(),
        scheduled_date: new.scheduled_date.clone(),
        status: "scheduled".to_string(),
        notes: String::new(),
        created_at: now_timestamp(),
    };
    conn.execute(
        "INSERT INTO meetings(id, class_id, student_id, parent_name, scheduled_date, status, notes, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            m.id,
            m.class_id,
            m.student_id,
            m.parent_name,
            m.scheduled_date,
            m.status,
            m.notes,
            m.created_at
        ],
    )?;
    Ok(m)
}

pub fn get_meeting(conn: &Connection, id: &str) -> Result<Option<Meeting>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?", MEETING_COLUMNS),
            [id],
            meeting_from_row,
        )
        .optional()?)
}

pub fn list_meetings(conn: &Connection, class_id: Option<&str>) -> Result<Vec<Meeting>> {
    filtered_query(
        conn,
        MEETING_COLUMNS,
        &[("class_id", class_id)],
        "rowid",
        meeting_from_row,
    )
}

pub fn update_meeting(conn: &Connection, id: &str, patch: &MeetingPatch) -> Result<Option<Meeting>> {
    let Some(mut m) = get_meeting(conn, id)? else {
        return Ok(None);
    };
    if let Some(v) = &patch.parent_name {
        m.parent_name = v.clone();
    }
    if let Some(v) = &patch.scheduled_date {
        m.scheduled_date = v.clone();
    }
    if let Some(v) = &patch.status {
        m.status = v.clone();
    }
    if let Some(v) = &patch.notes {
        m.notes = v.clone();
    }
    conn.execute(
        "UPDATE meetings SET parent_name = ?, scheduled_date = ?, status = ?, notes = ? WHERE id = ?",
        params![m.parent_name, m.scheduled_date, m.status, m.notes, m.id],
    )?;
    Ok(Some(m))
}

pub fn delete_meeting(conn: &Connection, id: &str) -> Result<bool> {
    Ok(conn.execute("DELETE FROM meetings WHERE id = ?", [id])? > 0)
}

// ==================== TEACHERS / AUTH ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub school: String,
    pub subjects: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewTeacher {
    pub username: String,
    pub password: String,
    pub name: String,
    pub school: String,
    pub subjects: Vec<String>,
}

const TEACHER_COLUMNS: &str =
    "SELECT id, username, password_hash, name, school, subjects, created_at FROM teachers";

fn teacher_from_row(r: &Row<'_>) -> rusqlite::Result<Teacher> {
    let subjects_raw: String = r.get(5)?;
    Ok(Teacher {
        id: r.get(0)?,
        username: r.get(1)?,
        password_hash: r.get(2)?,
        name: r.get(3)?,
        school: r.get(4)?,
        subjects: serde_json::from_str(&subjects_raw).unwrap_or_default(),
        created_at: r.get(6)?,
    })
}

/// Fails with [`Error::UsernameTaken`] when the username is already in use.
pub fn create_teacher(conn: &Connection, new: &NewTeacher) -> Result<Teacher> {
    let taken: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM teachers WHERE username = ?",
            [&new.username],
            |r| r.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(Error::UsernameTaken(new.username.clone()));
    }
    let t = Teacher {
        id: new_id(),
        username: new.username.clone(),
        password_hash: hash_password(&new.password),
        name: new.name.clone(),
        school: new.school.clone(),
        subjects: new.subjects.clone(),
        created_at: now_timestamp(),
    };
    conn.execute(
        "INSERT INTO teachers(id, username, password_hash, name, school, subjects, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            t.id,
            t.username,
            t.password_hash,
            t.name,
            t.school,
            serde_json::to_string(&t.subjects)?,
            t.created_at
        ],
    )?;
    Ok(t)
}

pub fn get_teacher(conn: &Connection, teacher_id: &str) -> Result<Option<Teacher>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?", TEACHER_COLUMNS),
            [teacher_id],
            teacher_from_row,
        )
        .optional()?)
}

pub fn find_teacher_by_credentials(
    conn: &Connection,
    username: &str,
    password: &str,
) -> Result<Option<Teacher>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE username = ? AND password_hash = ?", TEACHER_COLUMNS),
            params![username, hash_password(password)],
            teacher_from_row,
        )
        .optional()?)
}

pub fn list_teachers(conn: &Connection) -> Result<Vec<Teacher>> {
    filtered_query(conn, TEACHER_COLUMNS, &[], "rowid", teacher_from_row)
}

/// Issues a new session token for the teacher.
pub fn create_auth_session(conn: &Connection, teacher_id: &str) -> Result<String> {
    let token = new_id().replace('-', "");
    conn.execute(
        "INSERT INTO auth_sessions(token, teacher_id, created_at) VALUES(?, ?, ?)",
        params![token, teacher_id, now_timestamp()],
    )?;
    Ok(token)
}

pub fn teacher_for_token(conn: &Connection, token: &str) -> Result<Option<Teacher>> {
    let teacher_id: Option<String> = conn
        .query_row(
            "SELECT teacher_id FROM auth_sessions WHERE token = ?",
            [token],
            |r| r.get(0),
        )
        .optional()?;
    match teacher_id {
        Some(id) => get_teacher(conn, &id),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRequest {
    pub id: String,
    pub name: String,
    pub school: String,
    pub email: String,
    pub subjects: Vec<String>,
    pub created_at: String,
}

pub fn insert_teacher_request(
    conn: &Connection,
    name: &str,
    school: &str,
    email: &str,
    subjects: &[String],
) -> Result<TeacherRequest> {
    let req = TeacherRequest {
        id: new_id(),
        name: name.to_string(),
        school: school.to_string(),
        email: email.to_string(),
        subjects: subjects.to_vec(),
        created_at: now_timestamp(),
    };
    conn.execute(
        "INSERT INTO teacher_requests(id, name, school, email, subjects, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![
            req.id,
            req.name,
            req.school,
            req.email,
            serde_json::to_string(&req.subjects)?,
            req.created_at
        ],
    )?;
    Ok(req)
}

pub fn list_teacher_requests(conn: &Connection) -> Result<Vec<TeacherRequest>> {
    filtered_query(
        conn,
        "SELECT id, name, school, email, subjects, created_at FROM teacher_requests",
        &[],
        "rowid",
        |r| {
            let subjects_raw: String = r.get(4)?;
            Ok(TeacherRequest {
                id: r.get(0)?,
                name: r.get(1)?,
                school: r.get(2)?,
                email: r.get(3)?,
                subjects: serde_json::from_str(&subjects_raw).unwrap_or_default(),
                created_at: r.get(5)?,
            })
        },
    )
}


#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;
    use crate::db;

    #[test]
    fn assignment_creates_placeholder_grade_per_student() {
        let conn = db::open_in_memory().expect("db");
        let c = fixtures::class(&conn, "7A");
        fixtures::student(&conn, &c.id, "Ana");
        fixtures::student(&conn, &c.id, "Ben");
        let (a, created) = insert_assignment(
            &conn,
            &NewAssignment {
                class_id: c.id.clone(),
                title: "Fractions".to_string(),
                description: String::new(),
                due_date: None,
                total_marks: None,
                kind: None,
            },
        )
        .expect("insert");
        assert_eq!(created, 2);
        assert_eq!(a.total_marks, 100.0);
        let grades = list_grades(
            &conn,
            GradeFilter {
                assignment_id: Some(&a.id),
                ..Default::default()
            },
        )
        .expect("grades");
        assert_eq!(grades.len(), 2);
        assert!(grades.iter().all(|g| g.marks_obtained.is_none()));
        assert!(graded_work_for_class(&conn, &c.id).expect("work").is_empty());
    }

    #[test]
    fn attendance_upsert_keeps_one_row_per_day() {
        let conn = db::open_in_memory().expect("db");
        let c = fixtures::class(&conn, "7A");
        let s = fixtures::student(&conn, &c.id, "Ana");
        upsert_attendance(&conn, &c.id, &s.id, "2024-02-01", AttendanceStatus::Absent, "sick")
            .expect("first");
        let second =
            upsert_attendance(&conn, &c.id, &s.id, "2024-02-01", AttendanceStatus::Present, "")
                .expect("second");
        assert_eq!(second.status, AttendanceStatus::Present);
        let all = list_attendance(
            &conn,
            AttendanceFilter {
                class_id: Some(&c.id),
                ..Default::default()
            },
        )
        .expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].reason, "");
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let conn = db::open_in_memory().expect("db");
        let new = NewTeacher {
            username: "ms.lee".to_string(),
            password: "pw".to_string(),
            name: "Ms Lee".to_string(),
            school: String::new(),
            subjects: vec![],
        };
        create_teacher(&conn, &new).expect("first");
        let err = create_teacher(&conn, &new).expect_err("duplicate");
        assert_eq!(err.code(), "conflict");
        let found = find_teacher_by_credentials(&conn, "ms.lee", "pw").expect("query");
        assert!(found.is_some());
        assert!(find_teacher_by_credentials(&conn, "ms.lee", "nope")
            .expect("query")
            .is_none());
    }

    #[test]
    fn delete_class_removes_dependents() {
        let conn = db::open_in_memory().expect("db");
        let c = fixtures::class(&conn, "7A");
        let s = fixtures::student(&conn, &c.id, "Ana");
        fixtures::graded_series(&conn, &c.id, &s.id, &[50.0]);
        fixtures::attendance(&conn, &c.id, &s.id, 1, 2);
        assert!(delete_class(&conn, &c.id).expect("delete"));
        assert!(get_student(&conn, &s.id).expect("get").is_none());
        assert!(list_grades(&conn, GradeFilter::default()).expect("grades").is_empty());
        assert!(!delete_class(&conn, &c.id).expect("second delete"));
    }
}
