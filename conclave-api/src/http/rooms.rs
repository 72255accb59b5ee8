//! Read-only room inspection

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use conclave_sfu::{RoomId, RoomSnapshot, RoomSummary};
use serde::{Deserialize, Serialize};

use crate::http::{AppError, AppResult, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomList {
    pub rooms: Vec<RoomSummary>,
}

pub fn create_rooms_router() -> Router<AppState> {
    Router::new()
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/{room_id}", get(get_room))
}

pub async fn list_rooms(State(state): State<AppState>) -> Json<RoomList> {
    Json(RoomList {
        rooms: state.sfu.room_summaries(),
    })
}

pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<RoomSnapshot>> {
    let room_id = RoomId::parse(room_id)?;
    state
        .sfu
        .room_snapshot(&room_id)
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("room not found: {room_id}")))
}
