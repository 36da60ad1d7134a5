use crate::content::{self, Difficulty, SimulatedScorer};
use crate::ipc::helpers::{
    found, get_optional_str, get_optional_u64, get_required_str, get_string_list, to_result,
    with_db, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::Value;

/// Upper bound for generated question counts.
const MAX_QUESTIONS: u64 = 100;

fn question_count(params: &Value, key: &str) -> Result<usize, HandlerErr> {
    let count = get_optional_u64(params, key)?.unwrap_or(10);
    if count > MAX_QUESTIONS {
        return Err(HandlerErr::bad_params(format!(
            "{} must be at most {}",
            key, MAX_QUESTIONS
        )));
    }
    Ok(count as usize)
}

fn quiz(_conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let topics = get_string_list(params, "topics");
    if topics.is_empty() {
        return Err(HandlerErr::bad_params("topics must be a non-empty array"));
    }
    let difficulty = match get_optional_str(params, "difficulty") {
        None => Difficulty::default(),
        Some(raw) => Difficulty::parse(&raw)
            .ok_or_else(|| HandlerErr::bad_params(format!("invalid difficulty: {}", raw)))?,
    };
    let count = question_count(params, "numQuestions")?;
    to_result(&content::generate_quiz(&class_id, &topics, difficulty, count))
}

fn worksheet(conn: &Connection, params: &Value) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    let topic = get_required_str(params, "topic")?;
    let difficulty = get_optional_str(params, "difficulty").unwrap_or_else(|| "beginner".to_string());
    let sheet = content::generate_worksheet(conn, &student_id, &topic, &difficulty)?;
    to_result(&found(sheet, "student")?)
}

fn question_paper(_conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let count = question_count(params, "numberOfQuestions")?;
    let question_type = get_optional_str(params, "questionType").unwrap_or_else(|| "mixed".to_string());
    to_result(&content::generate_question_paper(&class_id, count, &question_type))
}

fn lesson_plan(_conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let topic = get_required_str(params, "topic")?;
    let duration = get_optional_u64(params, "duration")?.unwrap_or(60);
    let duration = u32::try_from(duration)
        .map_err(|_| HandlerErr::bad_params("duration is too large"))?;
    to_result(&content::generate_lesson_plan(&class_id, &topic, duration))
}

/// `answers` maps question ids to the chosen option.
fn auto_grade(conn: &Connection, params: &Value) -> HandlerResult {
    let quiz_id = get_required_str(params, "quizId")?;
    let Some(answers) = params.get("answers").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("answers must be an object"));
    };
    let scorer = SimulatedScorer::default();
    let mut result = found(content::auto_grade(conn, &scorer, &quiz_id, answers)?, "quiz")?;
    result.time_spent = get_optional_u64(params, "timeSpent")?.map(|t| t.min(u32::MAX as u64) as u32);
    to_result(&result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> HandlerResult = match req.method.as_str() {
        "generate.quiz" => quiz,
        "generate.worksheet" => worksheet,
        "generate.questionPaper" => question_paper,
        "generate.lessonPlan" => lesson_plan,
        "generate.autoGrade" => auto_grade,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
