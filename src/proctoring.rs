//! Exam proctoring sessions.
//!
//! A session is ACTIVE until it is ended, then COMPLETED for good. Flags are
//! append-only and only accepted while the session is ACTIVE. Ending an
//! already completed session changes nothing and returns the same report.
//! Integrity reports are recomputed from the stored flags on every call.

use crate::error::{Error, Result};
use crate::metrics::{average, round_to};
use crate::records::{new_id, now_timestamp};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Completed => "COMPLETED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProctoringSession {
    pub session_id: String,
    pub exam_id: String,
    pub student_id: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub status: SessionStatus,
    pub tab_switches: i64,
    pub webcam_alert: bool,
    pub audio_alert: bool,
    pub screen_share: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProctoringFlag {
    pub flag_id: String,
    pub session_id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub details: Value,
}

const SESSION_COLUMNS: &str = "SELECT id, exam_id, student_id, started_at, ended_at, status, tab_switches, webcam_alert, audio_alert, screen_share FROM proctoring_sessions";

fn session_from_row(r: &Row<'_>) -> rusqlite::Result<ProctoringSession> {
    let status: String = r.get(5)?;
    Ok(ProctoringSession {
        session_id: r.get(0)?,
        exam_id: r.get(1)?,
        student_id: r.get(2)?,
        start_time: r.get(3)?,
        end_time: r.get(4)?,
        status: if status == "COMPLETED" {
            SessionStatus::Completed
        } else {
            SessionStatus::Active
        },
        tab_switches: r.get(6)?,
        webcam_alert: r.get::<_, i64>(7)? != 0,
        audio_alert: r.get::<_, i64>(8)? != 0,
        screen_share: r.get::<_, i64>(9)? != 0,
    })
}

pub fn start_session(conn: &Connection, exam_id: &str, student_id: &str) -> Result<ProctoringSession> {
    let session = ProctoringSession {
        session_id: new_id(),
        exam_id: exam_id.to_string(),
        student_id: student_id.to_string(),
        start_time: now_timestamp(),
        end_time: None,
        status: SessionStatus::Active,
        tab_switches: 0,
        webcam_alert: false,
        audio_alert: false,
        screen_share: false,
    };
    conn.execute(
        "INSERT INTO proctoring_sessions(id, exam_id, student_id, started_at, status)
         VALUES(?, ?, ?, ?, ?)",
        params![
            session.session_id,
            session.exam_id,
            session.student_id,
            session.start_time,
            session.status.as_str()
        ],
    )?;
    tracing::info!(session = %session.session_id, exam = %exam_id, "proctoring session started");
    Ok(session)
}

pub fn get_session(conn: &Connection, session_id: &str) -> Result<Option<ProctoringSession>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?", SESSION_COLUMNS),
            [session_id],
            session_from_row,
        )
        .optional()?)
}

pub fn list_sessions(conn: &Connection) -> Result<Vec<ProctoringSession>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY rowid", SESSION_COLUMNS))?;
    let rows = stmt
        .query_map([], session_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn flags_for(conn: &Connection, session_id: &str) -> Result<Vec<ProctoringFlag>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, created_at, kind, severity, details
         FROM proctoring_flags
         WHERE session_id = ?
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([session_id], |r| {
            let severity: String = r.get(4)?;
            let details: String = r.get(5)?;
            Ok(ProctoringFlag {
                flag_id: r.get(0)?,
                session_id: r.get(1)?,
                timestamp: r.get(2)?,
                kind: r.get(3)?,
                severity: Severity::parse(&severity).unwrap_or_default(),
                details: serde_json::from_str(&details).unwrap_or(Value::Null),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Appends a flag and bumps the matching session counter. `None` for an
/// unknown session, [`Error::SessionClosed`] once the session is completed.
pub fn log_activity(
    conn: &Connection,
    session_id: &str,
    kind: &str,
    severity: Severity,
    details: Value,
) -> Result<Option<ProctoringFlag>> {
    let Some(session) = get_session(conn, session_id)? else {
        return Ok(None);
    };
    if session.status == SessionStatus::Completed {
        return Err(Error::SessionClosed(session_id.to_string()));
    }

    let flag = ProctoringFlag {
        flag_id: new_id(),
        session_id: session_id.to_string(),
        timestamp: now_timestamp(),
        kind: kind.to_string(),
        severity,
        details,
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO proctoring_flags(id, session_id, created_at, kind, severity, details)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![
            flag.flag_id,
            flag.session_id,
            flag.timestamp,
            flag.kind,
            flag.severity.as_str(),
            serde_json::to_string(&flag.details)?
        ],
    )?;
    let counter = match kind {
        "tab-switch" => Some("tab_switches = tab_switches + 1"),
        "audio-detected" => Some("audio_alert = 1"),
        "multiple-faces" | "face-missing" => Some("webcam_alert = 1"),
        "screen-share" | "second-screen" => Some("screen_share = 1"),
        _ => None,
    };
    if let Some(set) = counter {
        tx.execute(
            &format!("UPDATE proctoring_sessions SET {} WHERE id = ?", set),
            [session_id],
        )?;
    }
    tx.commit()?;

    tracing::debug!(session = %session_id, kind, severity = flag.severity.as_str(), "proctoring flag");
    Ok(Some(flag))
}

/// 100, minus 15 per high and 5 per medium flag, floored at 0.
pub fn integrity_score(high: usize, medium: usize) -> u32 {
    100u32.saturating_sub((high as u32).saturating_mul(15).saturating_add((medium as u32).saturating_mul(5)))
}

pub fn recommendation(score: u32) -> &'static str {
    if score >= 85 {
        "PASS - No significant cheating indicators"
    } else if score >= 70 {
        "REVIEW - Minor suspicious activity detected"
    } else if score >= 50 {
        "INVESTIGATE - Multiple suspicious activities. Manual review recommended"
    } else {
        "FAIL - Significant evidence of cheating"
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlagSummary {
    pub tab_switches: i64,
    pub webcam_alerts: u8,
    pub audio_detected: u8,
    pub screen_share_detected: u8,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub session_id: String,
    pub student_id: String,
    pub exam_id: String,
    pub start_time: String,
    pub end_time: Option<String>,
    /// Minutes; measured up to now while the session is still active.
    pub duration: f64,
    pub total_flags: usize,
    pub high_severity_flags: usize,
    pub medium_severity_flags: usize,
    pub integrity_score: u32,
    pub flag_summary: FlagSummary,
    pub all_flags: Vec<ProctoringFlag>,
    pub recommendation: &'static str,
    pub status: SessionStatus,
}

fn minutes_between(start: &str, end: Option<&str>) -> f64 {
    let Ok(start) = chrono::DateTime::parse_from_rfc3339(start) else {
        return 0.0;
    };
    let end = match end.map(chrono::DateTime::parse_from_rfc3339) {
        Some(Ok(t)) => t.with_timezone(&chrono::Utc),
        Some(Err(_)) => return 0.0,
        None => chrono::Utc::now(),
    };
    let ms = (end - start.with_timezone(&chrono::Utc)).num_milliseconds().max(0);
    round_to(ms as f64 / 60_000.0, 2)
}

fn report_for(conn: &Connection, session: ProctoringSession) -> Result<IntegrityReport> {
    let flags = flags_for(conn, &session.session_id)?;
    let high = flags.iter().filter(|f| f.severity == Severity::High).count();
    let medium = flags.iter().filter(|f| f.severity == Severity::Medium).count();
    let score = integrity_score(high, medium);

    Ok(IntegrityReport {
        duration: minutes_between(&session.start_time, session.end_time.as_deref()),
        total_flags: flags.len(),
        high_severity_flags: high,
        medium_severity_flags: medium,
        integrity_score: score,
        flag_summary: FlagSummary {
            tab_switches: session.tab_switches,
            webcam_alerts: session.webcam_alert as u8,
            audio_detected: session.audio_alert as u8,
            screen_share_detected: session.screen_share as u8,
        },
        all_flags: flags,
        recommendation: recommendation(score),
        status: session.status,
        session_id: session.session_id,
        student_id: session.student_id,
        exam_id: session.exam_id,
        start_time: session.start_time,
        end_time: session.end_time,
    })
}

/// Current report for any session, active or completed.
pub fn session_report(conn: &Connection, session_id: &str) -> Result<Option<IntegrityReport>> {
    match get_session(conn, session_id)? {
        Some(session) => Ok(Some(report_for(conn, session)?)),
        None => Ok(None),
    }
}

/// Completes the session and returns its report. Repeated calls keep the
/// original end time.
pub fn end_session(conn: &Connection, session_id: &str) -> Result<Option<IntegrityReport>> {
    let Some(session) = get_session(conn, session_id)? else {
        return Ok(None);
    };
    if session.status == SessionStatus::Active {
        conn.execute(
            "UPDATE proctoring_sessions SET status = ?, ended_at = ? WHERE id = ?",
            params![SessionStatus::Completed.as_str(), now_timestamp(), session_id],
        )?;
        tracing::info!(session = %session_id, "proctoring session completed");
    }
    session_report(conn, session_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamSecurity {
    Secure,
    Caution,
    Compromised,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedStudent {
    pub student_id: String,
    pub session_id: String,
    pub integrity_score: u32,
    pub flags: usize,
    pub recommendation: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExamIntegritySummary {
    pub exam_id: String,
    pub total_students: usize,
    pub avg_integrity_score: f64,
    pub students_flagged: usize,
    pub flagged_students: Vec<FlaggedStudent>,
    pub overall_security: ExamSecurity,
}

/// Aggregates the completed sessions of one exam. Active sessions are left
/// out; an exam with no completed session counts as fully secure.
pub fn exam_integrity_summary(conn: &Connection, exam_id: &str) -> Result<ExamIntegritySummary> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE exam_id = ? AND status = 'COMPLETED' ORDER BY rowid",
        SESSION_COLUMNS
    ))?;
    let sessions = stmt
        .query_map([exam_id], session_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut reports = Vec::with_capacity(sessions.len());
    for s in sessions {
        reports.push(report_for(conn, s)?);
    }

    let avg = if reports.is_empty() {
        100.0
    } else {
        average(
            &reports
                .iter()
                .map(|r| r.integrity_score as f64)
                .collect::<Vec<_>>(),
        )
    };
    let flagged: Vec<FlaggedStudent> = reports
        .iter()
        .filter(|r| r.integrity_score < 85)
        .map(|r| FlaggedStudent {
            student_id: r.student_id.clone(),
            session_id: r.session_id.clone(),
            integrity_score: r.integrity_score,
            flags: r.total_flags,
            recommendation: r.recommendation,
        })
        .collect();

    Ok(ExamIntegritySummary {
        exam_id: exam_id.to_string(),
        total_students: reports.len(),
        avg_integrity_score: avg.round(),
        students_flagged: flagged.len(),
        flagged_students: flagged,
        overall_security: if avg >= 85.0 {
            ExamSecurity::Secure
        } else if avg >= 70.0 {
            ExamSecurity::Caution
        } else {
            ExamSecurity::Compromised
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use serde_json::json;

    fn setup() -> Connection {
        crate::logging::init_test();
        db::open_in_memory().expect("db")
    }

    #[test]
    fn two_high_one_medium_needs_investigation() {
        let conn = setup();
        let s = start_session(&conn, "exam-1", "stu-1").expect("start");
        log_activity(&conn, &s.session_id, "tab-switch", Severity::High, json!({})).expect("flag");
        log_activity(&conn, &s.session_id, "multiple-faces", Severity::High, json!({"faces": 2}))
            .expect("flag");
        log_activity(&conn, &s.session_id, "audio-detected", Severity::Medium, json!({}))
            .expect("flag");

        let report = end_session(&conn, &s.session_id).expect("end").expect("session");
        assert_eq!(report.integrity_score, 65);
        assert!(report.recommendation.starts_with("INVESTIGATE"));
        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(report.flag_summary.tab_switches, 1);
        assert_eq!(report.flag_summary.webcam_alerts, 1);
        assert_eq!(report.flag_summary.audio_detected, 1);
        assert_eq!(report.flag_summary.screen_share_detected, 0);
        assert_eq!(report.all_flags[1].details, json!({"faces": 2}));
    }

    #[test]
    fn score_never_increases_with_more_flags() {
        let mut last = integrity_score(0, 0);
        assert_eq!(last, 100);
        for high in 0..10 {
            for medium in 0..10 {
                let s = integrity_score(high, medium);
                assert!(s <= 100);
                if medium > 0 {
                    assert!(s <= integrity_score(high, medium - 1));
                }
                if high > 0 {
                    assert!(s <= integrity_score(high - 1, medium));
                }
                last = s;
            }
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn completed_session_rejects_flags_and_ends_idempotently() {
        let conn = setup();
        let s = start_session(&conn, "exam-1", "stu-1").expect("start");
        let first = end_session(&conn, &s.session_id).expect("end").expect("session");
        let err = log_activity(&conn, &s.session_id, "tab-switch", Severity::High, json!({}))
            .expect_err("closed");
        assert_eq!(err.code(), "session_closed");

        let second = end_session(&conn, &s.session_id).expect("end").expect("session");
        assert_eq!(first.end_time, second.end_time);
        assert_eq!(second.total_flags, 0);
        assert!(end_session(&conn, "missing").expect("end").is_none());
    }

    #[test]
    fn exam_summary_ignores_active_sessions() {
        let conn = setup();
        assert_eq!(
            exam_integrity_summary(&conn, "exam-9").expect("summary").overall_security,
            ExamSecurity::Secure
        );

        let clean = start_session(&conn, "exam-9", "a").expect("start");
        let bad = start_session(&conn, "exam-9", "b").expect("start");
        let pending = start_session(&conn, "exam-9", "c").expect("start");
        for _ in 0..4 {
            log_activity(&conn, &bad.session_id, "second-screen", Severity::High, json!({}))
                .expect("flag");
            log_activity(&conn, &pending.session_id, "tab-switch", Severity::High, json!({}))
                .expect("flag");
        }
        end_session(&conn, &clean.session_id).expect("end");
        end_session(&conn, &bad.session_id).expect("end");

        let summary = exam_integrity_summary(&conn, "exam-9").expect("summary");
        assert_eq!(summary.total_students, 2);
        // (100 + 40) / 2
        assert_eq!(summary.avg_integrity_score, 70.0);
        assert_eq!(summary.overall_security, ExamSecurity::Caution);
        assert_eq!(summary.students_flagged, 1);
        assert_eq!(summary.flagged_students[0].student_id, "b");
    }
}
