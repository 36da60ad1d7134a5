use crate::ipc::helpers::{
    get_optional_str, get_required_str, get_string_list, to_result, with_db, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, NewTeacher};
use rusqlite::Connection;
use serde_json::{json, Value};

fn request_access(conn: &Connection, params: &Value) -> HandlerResult {
    let name = get_required_str(params, "name")?;
    let school = get_required_str(params, "school")?;
    let email = get_optional_str(params, "email").unwrap_or_default();
    let subjects = get_string_list(params, "subjects");
    let request = records::insert_teacher_request(conn, &name, &school, &email, &subjects)?;
    Ok(json!({ "message": "Request submitted", "request": request }))
}

fn list_requests(conn: &Connection, _params: &Value) -> HandlerResult {
    to_result(&records::list_teacher_requests(conn)?)
}

fn create_teacher(conn: &Connection, params: &Value) -> HandlerResult {
    let new = NewTeacher {
        username: get_required_str(params, "username")?,
        password: get_required_str(params, "password")?,
        name: get_required_str(params, "name")?,
        school: get_optional_str(params, "school").unwrap_or_default(),
        subjects: get_string_list(params, "subjects"),
    };
    let teacher = records::create_teacher(conn, &new)?;
    Ok(json!({
        "message": "Teacher created",
        "teacher": { "id": teacher.id, "username": teacher.username, "name": teacher.name }
    }))
}

fn login(conn: &Connection, params: &Value) -> HandlerResult {
    let username = get_required_str(params, "username")?;
    let password = get_required_str(params, "password")?;
    let Some(teacher) = records::find_teacher_by_credentials(conn, &username, &password)? else {
        return Err(HandlerErr::new("unauthorized", "invalid credentials"));
    };
    let token = records::create_auth_session(conn, &teacher.id)?;
    tracing::info!(teacher = %teacher.id, "teacher logged in");
    Ok(json!({
        "token": token,
        "teacher": { "id": teacher.id, "username": teacher.username, "name": teacher.name }
    }))
}

fn me(conn: &Connection, params: &Value) -> HandlerResult {
    let token = get_optional_str(params, "token")
        .map(|t| t.trim_start_matches("Bearer ").to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| HandlerErr::new("unauthorized", "missing token"))?;
    let Some(teacher) = records::teacher_for_token(conn, &token)? else {
        return Err(HandlerErr::new("unauthorized", "invalid session"));
    };
    to_result(&teacher)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> HandlerResult = match req.method.as_str() {
        "auth.requestAccess" => request_access,
        "auth.listRequests" => list_requests,
        "auth.createTeacher" => create_teacher,
        "auth.login" => login,
        "auth.me" => me,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
