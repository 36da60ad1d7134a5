//! Live classroom monitoring: students raise doubts on a concept, the
//! teacher watches a per-class dashboard and resolves them.

use crate::error::Result;
use crate::records::{self, new_id, now_timestamp};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomDoubt {
    pub id: String,
    pub class_id: String,
    pub student_id: String,
    pub concept_id: String,
    pub timestamp: String,
    pub resolved: bool,
}

const DOUBT_COLUMNS: &str =
    "SELECT id, class_id, student_id, concept_id, created_at, resolved FROM classroom_doubts";

fn doubt_from_row(r: &Row<'_>) -> rusqlite::Result<ClassroomDoubt> {
    Ok(ClassroomDoubt {
        id: r.get(0)?,
        class_id: r.get(1)?,
        student_id: r.get(2)?,
        concept_id: r.get(3)?,
        timestamp: r.get(4)?,
        resolved: r.get::<_, i64>(5)? != 0,
    })
}

pub fn log_doubt(
    conn: &Connection,
    class_id: &str,
    student_id: &str,
    concept_id: &str,
) -> Result<ClassroomDoubt> {
    let doubt = ClassroomDoubt {
        id: new_id(),
        class_id: class_id.to_string(),
        student_id: student_id.to_string(),
        concept_id: concept_id.to_string(),
        timestamp: now_timestamp(),
        resolved: false,
    };
    conn.execute(
        "INSERT INTO classroom_doubts(id, class_id, student_id, concept_id, created_at, resolved)
         VALUES(?, ?, ?, ?, ?, 0)",
        params![
            doubt.id,
            doubt.class_id,
            doubt.student_id,
            doubt.concept_id,
            doubt.timestamp
        ],
    )?;
    Ok(doubt)
}

pub fn list_doubts(conn: &Connection) -> Result<Vec<ClassroomDoubt>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY rowid", DOUBT_COLUMNS))?;
    let rows = stmt
        .query_map([], doubt_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Marks the doubt resolved; `None` if it does not exist.
pub fn resolve_doubt(conn: &Connection, doubt_id: &str) -> Result<Option<ClassroomDoubt>> {
    conn.execute(
        "UPDATE classroom_doubts SET resolved = 1 WHERE id = ?",
        [doubt_id],
    )?;
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?", DOUBT_COLUMNS),
            [doubt_id],
            doubt_from_row,
        )
        .optional()?)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentDoubts {
    pub name: String,
    pub doubts: usize,
    pub concepts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConceptHotspot {
    pub concept: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomDashboard {
    pub class_id: String,
    pub total_doubt_students: usize,
    pub total_unresolved_doubts: usize,
    pub student_doubts: BTreeMap<String, StudentDoubts>,
    pub concept_hotspots: Vec<ConceptHotspot>,
    pub recent_doubts: Vec<ClassroomDoubt>,
}

const RECENT_DOUBTS: usize = 20;

/// The last 20 unresolved doubts of a class, broken down by student and by
/// concept. `None` for an unknown class.
pub fn classroom_dashboard(conn: &Connection, class_id: &str) -> Result<Option<ClassroomDashboard>> {
    if records::get_class(conn, class_id)?.is_none() {
        return Ok(None);
    }
    let mut stmt = conn.prepare(&format!(
        "{} WHERE class_id = ? AND resolved = 0 ORDER BY rowid",
        DOUBT_COLUMNS
    ))?;
    let mut recent = stmt
        .query_map([class_id], doubt_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let skip = recent.len().saturating_sub(RECENT_DOUBTS);
    recent.drain(..skip);

    let mut student_doubts = BTreeMap::new();
    for s in records::list_students(conn, Some(class_id))? {
        let mine: Vec<&ClassroomDoubt> = recent.iter().filter(|d| d.student_id == s.id).collect();
        let mut concepts: Vec<String> = Vec::new();
        for d in &mine {
            if !concepts.contains(&d.concept_id) {
                concepts.push(d.concept_id.clone());
            }
        }
        student_doubts.insert(
            s.id,
            StudentDoubts {
                name: s.name,
                doubts: mine.len(),
                concepts,
            },
        );
    }

    let mut hotspots: Vec<ConceptHotspot> = Vec::new();
    for d in &recent {
        match hotspots.iter_mut().find(|h| h.concept == d.concept_id) {
            Some(h) => h.count += 1,
            None => hotspots.push(ConceptHotspot {
                concept: d.concept_id.clone(),
                count: 1,
            }),
        }
    }
    hotspots.sort_by(|a, b| b.count.cmp(&a.count));
    hotspots.truncate(5);

    Ok(Some(ClassroomDashboard {
        class_id: class_id.to_string(),
        total_doubt_students: student_doubts.values().filter(|s| s.doubts > 0).count(),
        total_unresolved_doubts: recent.len(),
        student_doubts,
        concept_hotspots: hotspots,
        recent_doubts: recent,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::records::fixtures;

    #[test]
    fn dashboard_counts_unresolved_doubts() {
        let conn = db::open_in_memory().expect("db");
        let c = fixtures::class(&conn, "7A");
        let a = fixtures::student(&conn, &c.id, "Ana");
        let b = fixtures::student(&conn, &c.id, "Ben");
        log_doubt(&conn, &c.id, &a.id, "fractions").expect("log");
        log_doubt(&conn, &c.id, &a.id, "fractions").expect("log");
        log_doubt(&conn, &c.id, &b.id, "decimals").expect("log");
        let done = log_doubt(&conn, &c.id, &b.id, "ratios").expect("log");
        let resolved = resolve_doubt(&conn, &done.id).expect("resolve").expect("doubt");
        assert!(resolved.resolved);

        let dash = classroom_dashboard(&conn, &c.id).expect("query").expect("class");
        assert_eq!(dash.total_unresolved_doubts, 3);
        assert_eq!(dash.total_doubt_students, 2);
        assert_eq!(dash.student_doubts[&a.id].doubts, 2);
        assert_eq!(dash.student_doubts[&a.id].concepts, vec!["fractions".to_string()]);
        assert_eq!(dash.concept_hotspots[0].concept, "fractions");
        assert_eq!(dash.concept_hotspots[0].count, 2);

        assert!(resolve_doubt(&conn, "missing").expect("resolve").is_none());
    }

    #[test]
    fn dashboard_keeps_only_recent_twenty() {
        let conn = db::open_in_memory().expect("db");
        let c = fixtures::class(&conn, "7A");
        let a = fixtures::student(&conn, &c.id, "Ana");
        for i in 0..25 {
            log_doubt(&conn, &c.id, &a.id, &format!("concept-{}", i)).expect("log");
        }
        let dash = classroom_dashboard(&conn, &c.id).expect("query").expect("class");
        assert_eq!(dash.recent_doubts.len(), 20);
        assert_eq!(dash.recent_doubts[0].concept_id, "concept-5");
        assert_eq!(dash.concept_hotspots.len(), 5);
    }
}
