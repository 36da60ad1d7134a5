//! JSON snapshots of the whole store.
//!
//! The dump layout matches the document the original Node backend kept on
//! disk (`classes`, `students`, `attendance`, ... with camelCase fields), so a
//! file written by that backend can be imported and a file written here can
//! be read by tools built against it.

use crate::config::SnapshotConfig;
use crate::db::DB_FILE_NAME;
use crate::error::Result;
use crate::records::{self, now_timestamp, AssignmentKind, AttendanceStatus, CommunicationKind};
use crate::{classroom, proctoring};
use anyhow::Context;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn export(conn: &Connection) -> Result<Value> {
    let mut assignments = Vec::new();
    for a in records::list_assignments(conn, None)? {
        let submissions = records::list_submissions(conn, &a.id)?;
        let mut v = serde_json::to_value(&a)?;
        if let Value::Object(map) = &mut v {
            map.insert("submissions".to_string(), serde_json::to_value(submissions)?);
        }
        assignments.push(v);
    }

    let teachers: Vec<Value> = records::list_teachers(conn)?
        .into_iter()
        .map(|t| {
            json!({
                "id": t.id,
                "username": t.username,
                "passwordHash": t.password_hash,
                "name": t.name,
                "school": t.school,
                "subjects": t.subjects,
                "createdAt": t.created_at,
            })
        })
        .collect();

    let mut sessions = Vec::new();
    for s in proctoring::list_sessions(conn)? {
        let flags = proctoring::flags_for(conn, &s.session_id)?;
        let mut v = serde_json::to_value(&s)?;
        if let Value::Object(map) = &mut v {
            map.insert("flags".to_string(), serde_json::to_value(flags)?);
        }
        sessions.push(v);
    }

    Ok(json!({
        "classes": records::list_classes(conn)?,
        "students": records::list_students(conn, None)?,
        "attendance": records::list_attendance(conn, records::AttendanceFilter::default())?,
        "assignments": assignments,
        "grades": records::list_grades(conn, records::GradeFilter::default())?,
        "communications": records::list_communications(conn)?,
        "resources": records::list_resources(conn, None)?,
        "participationLog": records::list_participation(conn, None)?,
        "meetings": records::list_meetings(conn, None)?,
        "teachers": teachers,
        "teacherRequests": records::list_teacher_requests(conn)?,
        "classroomDoubts": classroom::list_doubts(conn)?,
        "proctoringSessions": sessions,
        "exportedAt": now_timestamp(),
    }))
}

/// Writes the dump next to the store. The file is replaced atomically so a
/// reader never sees a half-written snapshot.
pub fn write_snapshot(conn: &Connection, out_path: &Path) -> anyhow::Result<()> {
    let dump = export(conn).context("failed to export store")?;
    let text = serde_json::to_string_pretty(&dump).context("failed to serialize snapshot")?;

    // The flusher thread and `store.snapshot` may write at the same time.
    let tmp_path = out_path.with_extension(format!("{}.writing", uuid::Uuid::new_v4().simple()));
    std::fs::write(&tmp_path, text)
        .with_context(|| format!("failed to write {}", tmp_path.to_string_lossy()))?;
    std::fs::rename(&tmp_path, out_path).with_context(|| {
        format!(
            "failed to move snapshot to {}",
            out_path.to_string_lossy()
        )
    })?;
    Ok(())
}

/// Workspace the background flusher should dump; empty until one is selected.
#[derive(Debug, Clone, Default)]
pub struct FlushTarget(Arc<Mutex<Option<PathBuf>>>);

impl FlushTarget {
    pub fn set(&self, workspace: PathBuf) {
        match self.0.lock() {
            Ok(mut slot) => *slot = Some(workspace),
            Err(poisoned) => *poisoned.into_inner() = Some(workspace),
        }
    }

    fn get(&self) -> Option<PathBuf> {
        match self.0.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Starts the flusher thread. It never touches the request loop's
/// connection: every tick opens a read-only one of its own.
pub fn spawn_flusher(config: SnapshotConfig, target: FlushTarget) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("snapshot-flush".to_string())
        .spawn(move || loop {
            std::thread::sleep(config.interval());
            let Some(workspace) = target.get() else {
                continue;
            };
            match flush_workspace(&workspace, &config.file_name) {
                Ok(()) => tracing::trace!(workspace = %workspace.display(), "snapshot flushed"),
                Err(e) => tracing::warn!(
                    workspace = %workspace.display(),
                    error = %format!("{:#}", e),
                    "snapshot flush failed"
                ),
            }
        })?;
    Ok(())
}

fn flush_workspace(workspace: &Path, file_name: &str) -> anyhow::Result<()> {
    let conn = Connection::open_with_flags(
        workspace.join(DB_FILE_NAME),
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(Duration::from_secs(5))?;
    write_snapshot(&conn, &workspace.join(file_name))
}

// ==================== IMPORT ====================

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Marks typed into a form arrive as strings; anything unparseable is
/// treated as not yet graded.
fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Dump {
    classes: Vec<DumpClass>,
    students: Vec<DumpStudent>,
    attendance: Vec<DumpAttendance>,
    assignments: Vec<DumpAssignment>,
    grades: Vec<DumpGrade>,
    communications: Vec<DumpCommunication>,
    resources: Vec<DumpResource>,
    participation_log: Vec<DumpParticipation>,
    meetings: Vec<DumpMeeting>,
    teachers: Vec<DumpTeacher>,
    teacher_requests: Vec<DumpTeacherRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DumpClass {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    name: String,
    #[serde(deserialize_with = "lenient_string")]
    section: String,
    #[serde(deserialize_with = "lenient_string")]
    subject: String,
    #[serde(deserialize_with = "lenient_string")]
    teacher: String,
    #[serde(deserialize_with = "lenient_number")]
    capacity: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    created_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DumpStudent {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    class_id: String,
    #[serde(deserialize_with = "lenient_string")]
    name: String,
    #[serde(deserialize_with = "lenient_string")]
    roll_no: String,
    #[serde(deserialize_with = "lenient_string")]
    email: String,
    #[serde(deserialize_with = "lenient_string")]
    phone: String,
    #[serde(deserialize_with = "lenient_string")]
    notes: String,
    #[serde(deserialize_with = "lenient_string")]
    enrolled_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DumpAttendance {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    class_id: String,
    #[serde(deserialize_with = "lenient_string")]
    student_id: String,
    #[serde(deserialize_with = "lenient_string")]
    date: String,
    #[serde(deserialize_with = "lenient_string")]
    status: String,
    #[serde(deserialize_with = "lenient_string")]
    reason: String,
    #[serde(deserialize_with = "lenient_string")]
    recorded_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DumpAssignment {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    class_id: String,
    #[serde(deserialize_with = "lenient_string")]
    title: String,
    #[serde(deserialize_with = "lenient_string")]
    description: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    due_date: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    total_marks: Option<f64>,
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    kind: String,
    submissions: Vec<DumpSubmission>,
    #[serde(deserialize_with = "lenient_string")]
    created_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DumpSubmission {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    student_id: String,
    #[serde(deserialize_with = "lenient_string")]
    content: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    file_url: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    submitted_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DumpGrade {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    class_id: String,
    #[serde(deserialize_with = "lenient_string")]
    student_id: String,
    #[serde(deserialize_with = "lenient_string")]
    assignment_id: String,
    #[serde(deserialize_with = "lenient_number")]
    marks_obtained: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    feedback: String,
    #[serde(deserialize_with = "lenient_string")]
    graded_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DumpCommunication {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    sender_id: String,
    #[serde(deserialize_with = "lenient_string")]
    receiver_id: String,
    #[serde(deserialize_with = "lenient_string")]
    message: String,
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    kind: String,
    read: bool,
    #[serde(deserialize_with = "lenient_string")]
    sent_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DumpResource {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    class_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    title: String,
    #[serde(deserialize_with = "lenient_string")]
    category: String,
    #[serde(deserialize_with = "lenient_string")]
    url: String,
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    kind: String,
    #[serde(deserialize_with = "lenient_string")]
    uploaded_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DumpParticipation {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    class_id: String,
    #[serde(deserialize_with = "lenient_string")]
    student_id: String,
    #[serde(deserialize_with = "lenient_string")]
    date: String,
    #[serde(deserialize_with = "lenient_string")]
    level: String,
    #[serde(deserialize_with = "lenient_string")]
    notes: String,
    #[serde(deserialize_with = "lenient_string")]
    recorded_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DumpMeeting {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    class_id: String,
    #[serde(deserialize_with = "lenient_string")]
    student_id: String,
    #[serde(deserialize_with = "lenient_string")]
    parent_name: String,
    #[serde(deserialize_with = "lenient_string")]
    scheduled_date: String,
    #[serde(deserialize_with = "lenient_string")]
    status: String,
    #[serde(deserialize_with = "lenient_string")]
    notes: String,
    #[serde(deserialize_with = "lenient_string")]
    created_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DumpTeacher {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    username: String,
    #[serde(deserialize_with = "lenient_string")]
    password_hash: String,
    #[serde(deserialize_with = "lenient_string")]
    name: String,
    #[serde(deserialize_with = "lenient_string")]
    school: String,
    subjects: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    created_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DumpTeacherRequest {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    name: String,
    #[serde(deserialize_with = "lenient_string")]
    school: String,
    #[serde(deserialize_with = "lenient_string")]
    email: String,
    subjects: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    created_at: String,
    #[serde(deserialize_with = "lenient_string")]
    submitted_at: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: BTreeMap<&'static str, usize>,
    /// Rows dropped because they point at a class, student or assignment
    /// the dump does not contain, or carry an unknown attendance status.
    pub skipped: usize,
}

impl ImportSummary {
    fn count(&mut self, collection: &'static str) {
        *self.imported.entry(collection).or_insert(0) += 1;
    }
}

fn or_new_id(id: String) -> String {
    if id.is_empty() {
        records::new_id()
    } else {
        id
    }
}

fn or_now(ts: String) -> String {
    if ts.is_empty() {
        now_timestamp()
    } else {
        ts
    }
}

fn exists(conn: &Connection, table: &str, id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?", table),
            [id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Loads a dump into the store, keeping record ids. Rows with the same id
/// are overwritten; teachers whose username already exists are left alone.
/// Runs in one transaction: a failure leaves the store untouched.
pub fn import(conn: &Connection, dump: Value) -> Result<ImportSummary> {
    let dump: Dump = serde_json::from_value(dump)?;
    let tx = conn.unchecked_transaction()?;
    let mut summary = ImportSummary::default();

    for c in dump.classes {
        tx.execute(
            "INSERT OR REPLACE INTO classes(id, name, section, subject, teacher, capacity, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            params![
                or_new_id(c.id),
                c.name,
                c.section,
                c.subject,
                c.teacher,
                c.capacity.map(|v| v as i64).unwrap_or(40),
                or_now(c.created_at)
            ],
        )?;
        summary.count("classes");
    }

    for s in dump.students {
        if !exists(&tx, "classes", &s.class_id)? {
            summary.skipped += 1;
            continue;
        }
        tx.execute(
            "INSERT OR REPLACE INTO students(id, class_id, name, roll_no, email, phone, notes, enrolled_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                or_new_id(s.id),
                s.class_id,
                s.name,
                s.roll_no,
                s.email,
                s.phone,
                s.notes,
                or_now(s.enrolled_at)
            ],
        )?;
        summary.count("students");
    }

    for a in dump.attendance {
        let Some(status) = AttendanceStatus::parse(&a.status) else {
            summary.skipped += 1;
            continue;
        };
        if a.date.is_empty()
            || !exists(&tx, "classes", &a.class_id)?
            || !exists(&tx, "students", &a.student_id)?
        {
            summary.skipped += 1;
            continue;
        }
        tx.execute(
            "INSERT OR REPLACE INTO attendance(id, class_id, student_id, date, status, reason, recorded_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            params![
                or_new_id(a.id),
                a.class_id,
                a.student_id,
                a.date,
                status.as_str(),
                a.reason,
                or_now(a.recorded_at)
            ],
        )?;
        summary.count("attendance");
    }

    for a in dump.assignments {
        if !exists(&tx, "classes", &a.class_id)? {
            summary.skipped += 1;
            continue;
        }
        let id = or_new_id(a.id);
        tx.execute(
            "INSERT OR REPLACE INTO assignments(id, class_id, title, description, due_date, total_marks, kind, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                a.class_id,
                a.title,
                a.description,
                a.due_date,
                a.total_marks.unwrap_or(100.0),
                AssignmentKind::from_db(&a.kind).as_str(),
                or_now(a.created_at)
            ],
        )?;
        summary.count("assignments");
        for sub in a.submissions {
            tx.execute(
                "INSERT OR REPLACE INTO submissions(id, assignment_id, student_id, content, file_url, submitted_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                params![
                    or_new_id(sub.id),
                    id,
                    sub.student_id,
                    sub.content,
                    sub.file_url,
                    or_now(sub.submitted_at)
                ],
            )?;
            summary.count("submissions");
        }
    }

    for g in dump.grades {
        if !exists(&tx, "classes", &g.class_id)?
            || !exists(&tx, "students", &g.student_id)?
            || !exists(&tx, "assignments", &g.assignment_id)?
        {
            summary.skipped += 1;
            continue;
        }
        tx.execute(
            "INSERT OR REPLACE INTO grades(id, class_id, student_id, assignment_id, marks_obtained, feedback, graded_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            params![
                or_new_id(g.id),
                g.class_id,
                g.student_id,
                g.assignment_id,
                g.marks_obtained,
                g.feedback,
                or_now(g.graded_at)
            ],
        )?;
        summary.count("grades");
    }

    for c in dump.communications {
        tx.execute(
            "INSERT OR REPLACE INTO communications(id, sender_id, receiver_id, message, kind, read, sent_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            params![
                or_new_id(c.id),
                c.sender_id,
                c.receiver_id,
                c.message,
                CommunicationKind::from_db(&c.kind).as_str(),
                c.read as i64,
                or_now(c.sent_at)
            ],
        )?;
        summary.count("communications");
    }

    for r in dump.resources {
        let kind = if r.kind.is_empty() { "pdf".to_string() } else { r.kind };
        tx.execute(
            "INSERT OR REPLACE INTO resources(id, class_id, title, category, url, kind, uploaded_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            params![
                or_new_id(r.id),
                r.class_id,
                r.title,
                r.category,
                r.url,
                kind,
                or_now(r.uploaded_at)
            ],
        )?;
        summary.count("resources");
    }

    for p in dump.participation_log {
        if !exists(&tx, "classes", &p.class_id)? || !exists(&tx, "students", &p.student_id)? {
            summary.skipped += 1;
            continue;
        }
        tx.execute(
            "INSERT OR REPLACE INTO participation_logs(id, class_id, student_id, date, level, notes, recorded_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            params![
                or_new_id(p.id),
                p.class_id,
                p.student_id,
                p.date,
                p.level,
                p.notes,
                or_now(p.recorded_at)
            ],
        )?;
        summary.count("participationLog");
    }

    for m in dump.meetings {
        let status = if m.status.is_empty() { "scheduled".to_string() } else { m.status };
        tx.execute(
            "INSERT OR REPLACE INTO meetings(id, class_id, student_id, parent_name, scheduled_date, status, notes, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                or_new_id(m.id),
                m.class_id,
                m.student_id,
                m.parent_name,
                m.scheduled_date,
                status,
                m.notes,
                or_now(m.created_at)
            ],
        )?;
        summary.count("meetings");
    }

    for t in dump.teachers {
        if t.username.is_empty() || t.password_hash.is_empty() {
            summary.skipped += 1;
            continue;
        }
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO teachers(id, username, password_hash, name, school, subjects, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            params![
                or_new_id(t.id),
                t.username,
                t.password_hash,
                t.name,
                t.school,
                serde_json::to_string(&t.subjects)?,
                or_now(t.created_at)
            ],
        )?;
        if inserted == 0 {
            summary.skipped += 1;
        } else {
            summary.count("teachers");
        }
    }

    for r in dump.teacher_requests {
        let created_at = if r.created_at.is_empty() { r.submitted_at } else { r.created_at };
        tx.execute(
            "INSERT OR REPLACE INTO teacher_requests(id, name, school, email, subjects, created_at)
             VALUES(?, ?, ?, ?, ?, ?)",
            params![
                or_new_id(r.id),
                r.name,
                r.school,
                r.email,
                serde_json::to_string(&r.subjects)?,
                or_now(created_at)
            ],
        )?;
        summary.count("teacherRequests");
    }

    tx.commit()?;
    tracing::info!(skipped = summary.skipped, imported = ?summary.imported, "snapshot imported");
    Ok(summary)
}
