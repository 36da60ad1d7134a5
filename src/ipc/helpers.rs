use crate::ipc::error::{err, ok};
pub use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

/// Runs `f` against the open workspace store and wraps the outcome in a
/// response envelope.
pub fn with_db(
    state: &AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &Value) -> HandlerResult,
) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => {
            tracing::warn!(method = %req.method, code = error.code, message = %error.message, "request failed");
            error.response(&req.id)
        }
    }
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn get_optional_u64(params: &Value, key: &str) -> Result<Option<u64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a non-negative integer", key))),
    }
}

pub fn get_string_list(params: &Value, key: &str) -> Vec<String> {
    params
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Deserializes a params object (or one of its members) into a typed input.
pub fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, HandlerErr> {
    serde_json::from_value(params.clone()).map_err(|e| {
        HandlerErr::bad_params("invalid params").with_details(json!({ "error": e.to_string() }))
    })
}

pub fn found<T>(value: Option<T>, what: &str) -> Result<T, HandlerErr> {
    value.ok_or_else(|| HandlerErr::not_found(what))
}

pub fn to_result<T: Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value).map_err(|e| HandlerErr::new("internal", e.to_string()))
}

pub fn class_exists(conn: &Connection, class_id: &str) -> Result<(), HandlerErr> {
    match crate::records::get_class(conn, class_id)? {
        Some(_) => Ok(()),
        None => Err(HandlerErr::not_found("class")),
    }
}

pub fn student_exists(conn: &Connection, student_id: &str) -> Result<(), HandlerErr> {
    match crate::records::get_student(conn, student_id)? {
        Some(_) => Ok(()),
        None => Err(HandlerErr::not_found("student")),
    }
}
