use crate::ipc::helpers::{
    class_exists, found, get_optional_str, get_required_str, parse_params, to_result, with_db,
    HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, NewResource, ResourcePatch};
use rusqlite::Connection;
use serde_json::{json, Value};

fn resources_list(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_optional_str(params, "classId");
    to_result(&records::list_resources(conn, class_id.as_deref())?)
}

fn resources_create(conn: &Connection, params: &Value) -> HandlerResult {
    let new: NewResource = parse_params(params)?;
    if new.title.trim().is_empty() {
        return Err(HandlerErr::bad_params("missing title"));
    }
    if let Some(class_id) = new.class_id.as_deref() {
        class_exists(conn, class_id)?;
    }
    to_result(&records::insert_resource(conn, &new)?)
}

fn resources_get(conn: &Connection, params: &Value) -> HandlerResult {
    let id = get_required_str(params, "resourceId")?;
    to_result(&found(records::get_resource(conn, &id)?, "resource")?)
}

fn resources_update(conn: &Connection, params: &Value) -> HandlerResult {
    let id = get_required_str(params, "resourceId")?;
    let patch: ResourcePatch = parse_params(params.get("patch").unwrap_or(params))?;
    to_result(&found(records::update_resource(conn, &id, &patch)?, "resource")?)
}

fn resources_delete(conn: &Connection, params: &Value) -> HandlerResult {
    let id = get_required_str(params, "resourceId")?;
    if !records::delete_resource(conn, &id)? {
        return Err(HandlerErr::not_found("resource"));
    }
    Ok(json!({ "message": "Resource deleted" }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> HandlerResult = match req.method.as_str() {
        "resources.list" => resources_list,
        "resources.create" => resources_create,
        "resources.get" => resources_get,
        "resources.update" => resources_update,
        "resources.delete" => resources_delete,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
