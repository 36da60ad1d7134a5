use crate::ipc::helpers::{
    class_exists, get_required_str, parse_params, to_result, with_db, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, CommunicationKind};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessage {
    sender_id: String,
    receiver_id: String,
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<CommunicationKind>,
}

fn messages_list(conn: &Connection, _params: &Value) -> HandlerResult {
    to_result(&records::list_communications(conn)?)
}

fn messages_send(conn: &Connection, params: &Value) -> HandlerResult {
    let input: SendMessage = parse_params(params)?;
    if input.message.trim().is_empty() {
        return Err(HandlerErr::bad_params("missing message"));
    }
    let sent = records::insert_communication(
        conn,
        &input.sender_id,
        &input.receiver_id,
        &input.message,
        input.kind.unwrap_or_default(),
    )?;
    to_result(&sent)
}

fn messages_for_user(conn: &Connection, params: &Value) -> HandlerResult {
    let user_id = get_required_str(params, "userId")?;
    to_result(&records::messages_for_user(conn, &user_id)?)
}

/// Announcements are communications addressed to a class id.
fn announcements_post(conn: &Connection, params: &Value) -> HandlerResult {
    let sender_id = get_required_str(params, "senderId")?;
    let class_id = get_required_str(params, "classId")?;
    let message = get_required_str(params, "message")?;
    class_exists(conn, &class_id)?;
    let sent = records::insert_communication(
        conn,
        &sender_id,
        &class_id,
        &message,
        CommunicationKind::Announcement,
    )?;
    to_result(&sent)
}

fn announcements_for_class(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    to_result(&records::announcements_for_class(conn, &class_id)?)
}

fn messages_delete(conn: &Connection, params: &Value) -> HandlerResult {
    let id = get_required_str(params, "communicationId")?;
    if !records::delete_communication(conn, &id)? {
        return Err(HandlerErr::not_found("communication"));
    }
    Ok(json!({ "message": "Communication deleted" }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> HandlerResult = match req.method.as_str() {
        "messages.list" => messages_list,
        "messages.send" => messages_send,
        "messages.forUser" => messages_for_user,
        "messages.delete" => messages_delete,
        "announcements.post" => announcements_post,
        "announcements.forClass" => announcements_for_class,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
