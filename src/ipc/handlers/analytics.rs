//! `ai.*` methods: per-student analytics and per-class aggregation. Every
//! method is a pure read of the store.

use crate::class_analytics as ca;
use crate::error::Result;
use crate::ipc::helpers::{
    found, get_optional_u64, get_required_str, to_result, with_db, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::student_analytics as sa;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

fn for_student<T: Serialize>(
    conn: &Connection,
    params: &Value,
    f: fn(&Connection, &str) -> Result<Option<T>>,
) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    to_result(&found(f(conn, &student_id)?, "student")?)
}

fn for_class<T: Serialize>(
    conn: &Connection,
    params: &Value,
    f: fn(&Connection, &str) -> Result<Option<T>>,
) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    to_result(&found(f(conn, &class_id)?, "class")?)
}

const DEFAULT_MONTHS_BACK: u64 = 6;

fn longitudinal(conn: &Connection, params: &Value) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    let months_back = get_optional_u64(params, "monthsBack")?.unwrap_or(DEFAULT_MONTHS_BACK);
    let months = sa::longitudinal_tracking(conn, &student_id, months_back as usize)?;
    to_result(&found(months, "student")?)
}

fn time_on_task(conn: &Connection, params: &Value) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    let assignment_id = get_required_str(params, "assignmentId")?;
    let result = sa::time_on_task(conn, &student_id, &assignment_id)?;
    to_result(&found(result, "student or assignment")?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let resp = match req.method.as_str() {
        // per student
        "ai.predict" => with_db(state, req, |c, p| for_student(c, p, sa::predict_performance)),
        "ai.knowledgeGaps" => {
            with_db(state, req, |c, p| for_student(c, p, sa::identify_knowledge_gaps))
        }
        "ai.weakTopics" => with_db(state, req, |c, p| for_student(c, p, sa::weak_topics)),
        "ai.feedback" => with_db(state, req, |c, p| for_student(c, p, sa::generate_feedback)),
        "ai.cohort" => with_db(state, req, |c, p| for_student(c, p, sa::compare_to_cohort)),
        "ai.adaptiveSuggestions" => {
            with_db(state, req, |c, p| for_student(c, p, sa::adaptive_suggestions))
        }
        "ai.longitudinal" => with_db(state, req, longitudinal),
        "ai.parentReport" => with_db(state, req, |c, p| for_student(c, p, sa::parent_report)),
        "ai.patterns" => with_db(state, req, |c, p| for_student(c, p, sa::student_patterns)),
        "ai.timeOnTask" => with_db(state, req, time_on_task),
        "ai.contentRecommendations" => {
            with_db(state, req, |c, p| for_student(c, p, sa::content_recommendations))
        }
        // per class
        "ai.heatmap" => with_db(state, req, |c, p| for_class(c, p, ca::performance_heatmap)),
        "ai.effortOutcome" => {
            with_db(state, req, |c, p| for_class(c, p, ca::effort_outcome_analysis))
        }
        "ai.gradingInsights" => with_db(state, req, |c, p| for_class(c, p, ca::grading_insights)),
        "ai.engagementHeatmap" => {
            with_db(state, req, |c, p| for_class(c, p, ca::engagement_heatmap))
        }
        "ai.classPredictions" => {
            with_db(state, req, |c, p| for_class(c, p, ca::class_predictions))
        }
        "ai.classSummary" => with_db(state, req, |c, p| for_class(c, p, ca::class_summary)),
        "ai.classFeedback" => with_db(state, req, |c, p| for_class(c, p, ca::class_feedback)),
        "ai.parentClassInsights" => {
            with_db(state, req, |c, p| for_class(c, p, ca::parent_class_insights))
        }
        "ai.schedule" => {
            with_db(state, req, |c, p| for_class(c, p, ca::optimize_class_schedule))
        }
        "ai.lessonTime" => {
            with_db(state, req, |c, p| for_class(c, p, ca::suggested_lesson_time))
        }
        "ai.dashboard" => with_db(state, req, |c, p| for_class(c, p, ca::ai_dashboard)),
        _ => return None,
    };
    Some(resp)
}
