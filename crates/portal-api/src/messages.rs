use axum::{
    Extension, Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, warn};

use portal_db::models::MessageRow;
use portal_types::api::{ConversationMessage, EditMessageRequest, Envelope, SendMessageRequest};
use portal_types::message::{BodyError, UNSENT_BODY, normalize_body};

use crate::error::ApiError;
use crate::session::Identity;
use crate::state::{AppState, with_db};

/// The only conversation target the API understands: `/messages/user/{id}`.
const TARGET_USER: &str = "user";

/// GET /messages/user/{other_id}
pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    target: Result<Path<(String, String)>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path((mode, other)) = target.map_err(|_| ApiError::InvalidTarget)?;
    let other = match parse_id(&other) {
        Some(id) if mode == TARGET_USER => id,
        _ => return Err(ApiError::InvalidTarget),
    };

    let me = identity.user_id;
    let rows = with_db(&state, "Query failed", move |db| db.get_conversation(me, other)).await?;
    let messages: Vec<ConversationMessage> = rows.into_iter().map(to_wire).collect();

    Ok(Json(Envelope::data(me, messages)))
}

/// GET /messages and GET /messages/{x}: a conversation read without a
/// `user/{id}` target.
pub async fn missing_target(Extension(_identity): Extension<Identity>) -> ApiError {
    ApiError::InvalidTarget
}

/// POST /messages
pub async fn send_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    req: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = req.map_err(body_rejection)?;

    let recipient = req
        .recipient_id
        .filter(|id| *id > 0)
        .ok_or(ApiError::InvalidInput("Invalid input"))?;
    let body = checked_body(req.message.as_deref())?;

    let me = identity.user_id;
    let message_id = with_db(&state, "Insert failed", move |db| {
        db.insert_message(me, recipient, &body)
    })
    .await?;

    debug!("User {} sent message {} to {}", me, message_id, recipient);

    Ok((
        StatusCode::CREATED,
        Json(Envelope::ack(201, me, "Message sent").with_message_id(message_id)),
    ))
}

/// PUT /messages/{message_id}. Only the original sender may edit.
pub async fn edit_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    message_id: Result<Path<String>, PathRejection>,
    req: Result<Json<EditMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let message_id = message_id
        .ok()
        .and_then(|Path(raw)| parse_id(&raw))
        .ok_or(ApiError::InvalidInput("Invalid input"))?;
    let Json(req) = req.map_err(body_rejection)?;
    let body = checked_body(req.message.as_deref())?;

    let me = identity.user_id;
    rewrite_body(&state, me, message_id, body, "Update failed").await?;

    Ok(Json(Envelope::ack(200, me, "Message updated")))
}

/// PUT /messages without an id.
pub async fn missing_edit_id(Extension(_identity): Extension<Identity>) -> ApiError {
    ApiError::InvalidInput("Invalid input")
}

/// DELETE /messages/{message_id}, aka "unsend": the row stays, its text is
/// replaced by the sentinel. Repeating it succeeds with no visible change.
pub async fn unsend_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    message_id: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let message_id = message_id
        .ok()
        .and_then(|Path(raw)| parse_id(&raw))
        .ok_or(ApiError::InvalidInput("Invalid ID"))?;

    let me = identity.user_id;
    rewrite_body(&state, me, message_id, UNSENT_BODY.to_string(), "Unsend failed").await?;

    Ok(Json(Envelope::ack(200, me, "Message unsent")))
}

/// DELETE /messages without an id.
pub async fn missing_unsend_id(Extension(_identity): Extension<Identity>) -> ApiError {
    ApiError::InvalidInput("Invalid ID")
}

async fn rewrite_body(
    state: &AppState,
    me: i64,
    message_id: i64,
    body: String,
    context: &'static str,
) -> Result<(), ApiError> {
    let matched = with_db(state, context, move |db| {
        db.update_message_body(message_id, me, &body)
    })
    .await?;

    if !matched {
        warn!("User {} may not rewrite message {}", me, message_id);
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// Oversized request bodies are refused by the extractor before the length
/// rule ever runs; they still answer 413.
fn body_rejection(rejection: JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::InvalidInput("Invalid input")
    }
}

fn checked_body(raw: Option<&str>) -> Result<String, ApiError> {
    match normalize_body(raw.unwrap_or_default()) {
        Ok(body) => Ok(body.to_string()),
        Err(BodyError::Empty) => Err(ApiError::InvalidInput("Invalid input")),
        Err(BodyError::TooLong) => Err(ApiError::PayloadTooLarge),
    }
}

/// Positive integer ids only; anything else is treated as absent.
fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

fn to_wire(row: MessageRow) -> ConversationMessage {
    ConversationMessage {
        message_id: row.id,
        sender_id: row.sender_id,
        date_time: parse_sent_at(&row),
        username: row.sender_username,
        message: row.body,
    }
}

fn parse_sent_at(row: &MessageRow) -> chrono::DateTime<chrono::Utc> {
    row.sent_at
        .parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            // SQLite stores "YYYY-MM-DD HH:MM:SS.fff" without a timezone; it is UTC.
            chrono::NaiveDateTime::parse_from_str(&row.sent_at, "%Y-%m-%d %H:%M:%S%.f")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt sent_at '{}' on message {}: {}", row.sent_at, row.id, e);
            chrono::DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(parse_id("42"), Some(42));
        assert_eq!(parse_id("0"), None);
        assert_eq!(parse_id("-3"), None);
        assert_eq!(parse_id("abc"), None);
        assert_eq!(parse_id(""), None);
    }

    #[test]
    fn sqlite_timestamps_parse_as_utc() {
        let row = MessageRow {
            id: 1,
            sender_id: 1,
            recipient_id: 2,
            sender_username: "alice".into(),
            body: "hi".into(),
            sent_at: "2026-03-04 05:06:07.089".into(),
        };
        let parsed = parse_sent_at(&row);
        assert_eq!(parsed.to_rfc3339(), "2026-03-04T05:06:07.089+00:00");
    }

    #[test]
    fn body_errors_map_to_status() {
        assert!(matches!(checked_body(None), Err(ApiError::InvalidInput(_))));
        assert!(matches!(checked_body(Some("   ")), Err(ApiError::InvalidInput(_))));
        assert!(matches!(
            checked_body(Some(&"y".repeat(2001))),
            Err(ApiError::PayloadTooLarge)
        ));
        assert_eq!(checked_body(Some("  ok ")).unwrap(), "ok");
    }
}
