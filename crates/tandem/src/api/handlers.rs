//! API request handlers.

use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tandem_protocol::RoomCode;

use crate::chat::{AppendMessageRequest, ChatMessage, TurnRequest};
use crate::notify::MessageFeed;
use crate::room::{CreateRoomRequest, JoinRoomRequest, Room};

use super::error::{ApiError, ApiResult};
use super::state::AppState;

// ============================================================================
// Response types
// ============================================================================

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// A room plus its shareable invite link.
#[derive(Debug, Serialize)]
pub struct RoomResponse {
    #[serde(flatten)]
    pub room: Room,
    pub invite_link: String,
}

/// Result of joining a room by code.
#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub room_id: String,
    pub code: RoomCode,
    pub creator_name: String,
    pub partner_name: String,
    pub messages: Vec<ChatMessage>,
}

/// Incremental fetch query.
#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    /// Number of messages the caller already has.
    pub after: Option<i64>,
}

/// Transcript page.
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<ChatMessage>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Liveness check.
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Create a room.
///
/// POST /rooms
pub async fn create_room(
    State(state): State<AppState>,
    Json(request): Json<CreateRoomRequest>,
) -> ApiResult<(StatusCode, Json<RoomResponse>)> {
    if request.creator_name.trim().is_empty() {
        return Err(ApiError::bad_request("creator_name must not be empty"));
    }

    let room = state.rooms.create_room(&request.creator_name).await?;
    let invite_link = state.rooms.invite_link(&room);
    Ok((StatusCode::CREATED, Json(RoomResponse { room, invite_link })))
}

/// Join a room by code.
///
/// POST /rooms/join
pub async fn join_room(
    State(state): State<AppState>,
    Json(request): Json<JoinRoomRequest>,
) -> ApiResult<Json<JoinResponse>> {
    let code = RoomCode::parse(&request.code)
        .map_err(|err| ApiError::bad_request(err.to_string()))?;
    if request.partner_name.trim().is_empty() {
        return Err(ApiError::bad_request("partner_name must not be empty"));
    }

    let joined = state
        .rooms
        .join_room(&code, &request.partner_name)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("session not found: {}", code)))?;

    let partner_name = joined
        .room
        .partner_name
        .clone()
        .unwrap_or_else(|| request.partner_name.trim().to_string());
    Ok(Json(JoinResponse {
        room_id: joined.room.id.clone(),
        code: joined.room.code.clone(),
        creator_name: joined.room.creator_name.clone(),
        partner_name,
        messages: joined.messages,
    }))
}

/// Get a room. Drives the creator's partner poll.
///
/// GET /rooms/{room_id}
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> ApiResult<Json<RoomResponse>> {
    let room = state
        .rooms
        .get_room(&room_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("room not found: {}", room_id)))?;
    let invite_link = state.rooms.invite_link(&room);
    Ok(Json(RoomResponse { room, invite_link }))
}

/// Append a message to a room's transcript.
///
/// POST /rooms/{room_id}/messages
pub async fn append_message(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<AppendMessageRequest>,
) -> ApiResult<(StatusCode, Json<ChatMessage>)> {
    if request.content.trim().is_empty() {
        return Err(ApiError::bad_request("content must not be empty"));
    }

    let message = state.chat.append_message(&room_id, request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// List a room's transcript, optionally past an offset.
///
/// GET /rooms/{room_id}/messages?after=N
pub async fn list_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Json<MessagesResponse>> {
    let messages = state.chat.list_messages(&room_id, query.after).await?;
    Ok(Json(MessagesResponse { messages }))
}

/// Send one turn and stream the assistant reply as plain text chunks.
///
/// POST /rooms/{room_id}/turns
pub async fn send_turn(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<TurnRequest>,
) -> ApiResult<Response> {
    if request.text.trim().is_empty() {
        return Err(ApiError::bad_request("text must not be empty"));
    }
    if request.sender_name.trim().is_empty() {
        return Err(ApiError::bad_request("sender_name must not be empty"));
    }

    let stream = state.chat.run_turn(&room_id, request).await?;
    let body = Body::from_stream(stream.map(Ok::<_, std::convert::Infallible>));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response())
}

/// Stream message-insert events for a room.
///
/// GET /rooms/{room_id}/events
pub async fn room_events(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    if state.rooms.get_room(&room_id).await?.is_none() {
        return Err(ApiError::not_found(format!("room not found: {}", room_id)));
    }

    let stream = state
        .feed
        .subscribe(&room_id)
        .await?
        .map(|message| Event::default().event("insert").json_data(&message));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
