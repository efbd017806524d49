//! Presenter message handlers
//!
//! Successful state changes reach every client through the room's
//! subscriptions, so most handlers answer with nothing.

use super::handlers::Connection;
use crate::auth::GateState;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{QuestionDraft, QuestionId, RoomStatus};
use std::sync::Arc;

pub async fn handle_unlock(
    state: &Arc<AppState>,
    conn: &mut Connection,
    password: String,
) -> Option<ServerMessage> {
    match state.verify_presenter(&conn.code, &password).await {
        Ok(accepted) => match conn.gate.record_attempt(accepted) {
            GateState::Unlocked => {
                tracing::info!("Presenter unlocked room {}", conn.code);
                Some(ServerMessage::Unlocked)
            }
            GateState::Locked => Some(ServerMessage::error(
                "UNAUTHORIZED",
                "Incorrect password. Try again.",
            )),
        },
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_add_question(
    state: &Arc<AppState>,
    conn: &Connection,
    draft: QuestionDraft,
) -> Option<ServerMessage> {
    match state.add_question(&conn.code, draft).await {
        Ok(question) => Some(ServerMessage::QuestionCreated { question }),
        Err(e) => {
            tracing::warn!("Add question rejected in room {}: {}", conn.code, e);
            Some(e.into())
        }
    }
}

pub async fn handle_update_question(
    state: &Arc<AppState>,
    conn: &Connection,
    question_id: QuestionId,
    draft: QuestionDraft,
) -> Option<ServerMessage> {
    match state.update_question(&conn.code, &question_id, draft).await {
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Update of {} rejected: {}", question_id, e);
            Some(e.into())
        }
    }
}

pub async fn handle_delete_question(
    state: &Arc<AppState>,
    conn: &Connection,
    question_id: QuestionId,
) -> Option<ServerMessage> {
    state
        .delete_question(&conn.code, &question_id)
        .await
        .err()
        .map(Into::into)
}

pub async fn handle_activate_question(
    state: &Arc<AppState>,
    conn: &Connection,
    question_id: QuestionId,
) -> Option<ServerMessage> {
    state
        .activate_question(&conn.code, &question_id)
        .await
        .err()
        .map(Into::into)
}

pub async fn handle_toggle_results(
    state: &Arc<AppState>,
    conn: &Connection,
) -> Option<ServerMessage> {
    state.toggle_results(&conn.code).await.err().map(Into::into)
}

pub async fn handle_close_question(
    state: &Arc<AppState>,
    conn: &Connection,
) -> Option<ServerMessage> {
    state.close_question(&conn.code).await.err().map(Into::into)
}

pub async fn handle_clear_responses(
    state: &Arc<AppState>,
    conn: &Connection,
    question_id: QuestionId,
) -> Option<ServerMessage> {
    match state.clear_responses(&conn.code, &question_id).await {
        Ok(count) => Some(ServerMessage::ResponsesCleared { question_id, count }),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_set_room_status(
    state: &Arc<AppState>,
    conn: &Connection,
    status: RoomStatus,
) -> Option<ServerMessage> {
    state
        .set_room_status(&conn.code, status)
        .await
        .err()
        .map(Into::into)
}
