//! WebSocket message dispatch
//!
//! Authorization is checked here, then dispatched to role-specific handler
//! modules.

use crate::auth::PresenterGate;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{ParticipantId, Role, RoomCode};
use std::sync::Arc;

use super::{participant, presenter};

/// What the server knows about one socket
#[derive(Debug, Clone)]
pub struct Connection {
    pub code: RoomCode,
    pub role: Role,
    pub participant_id: Option<ParticipantId>,
    pub gate: PresenterGate,
}

impl Connection {
    pub fn presenter(code: impl Into<RoomCode>, password_protected: bool) -> Self {
        Self {
            code: code.into(),
            role: Role::Presenter,
            participant_id: None,
            gate: PresenterGate::for_room(password_protected),
        }
    }

    pub fn participant(code: impl Into<RoomCode>, participant_id: impl Into<ParticipantId>) -> Self {
        Self {
            code: code.into(),
            role: Role::Participant,
            participant_id: Some(participant_id.into()),
            gate: PresenterGate::for_room(true),
        }
    }
}

/// Macro to check presenter authorization and return early if unauthorized
macro_rules! check_presenter {
    ($conn:expr, $action:expr) => {
        if $conn.role != Role::Presenter {
            return Some(ServerMessage::Error {
                code: "UNAUTHORIZED".to_string(),
                msg: format!("Only the presenter can {}", $action),
            });
        }
        if !$conn.gate.is_unlocked() {
            return Some(ServerMessage::Error {
                code: "LOCKED".to_string(),
                msg: format!("Unlock presenter access to {}", $action),
            });
        }
    };
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    conn: &mut Connection,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Unlock { password } => {
            if conn.role != Role::Presenter {
                return Some(ServerMessage::error(
                    "UNAUTHORIZED",
                    "Only the presenter can unlock",
                ));
            }
            presenter::handle_unlock(state, conn, password).await
        }

        // Participant messages
        ClientMessage::SubmitResponse {
            question_id,
            selected_options,
        } => participant::handle_submit_response(state, conn, question_id, selected_options).await,

        // Presenter-only commands (authorization checked before dispatch)
        ClientMessage::AddQuestion { question } => {
            check_presenter!(conn, "add questions");
            presenter::handle_add_question(state, conn, question).await
        }

        ClientMessage::UpdateQuestion {
            question_id,
            question,
        } => {
            check_presenter!(conn, "edit questions");
            presenter::handle_update_question(state, conn, question_id, question).await
        }

        ClientMessage::DeleteQuestion { question_id } => {
            check_presenter!(conn, "delete questions");
            presenter::handle_delete_question(state, conn, question_id).await
        }

        ClientMessage::ActivateQuestion { question_id } => {
            check_presenter!(conn, "activate questions");
            presenter::handle_activate_question(state, conn, question_id).await
        }

        ClientMessage::ToggleResults => {
            check_presenter!(conn, "show or hide results");
            presenter::handle_toggle_results(state, conn).await
        }

        ClientMessage::CloseQuestion => {
            check_presenter!(conn, "close questions");
            presenter::handle_close_question(state, conn).await
        }

        ClientMessage::ClearResponses { question_id } => {
            check_presenter!(conn, "clear responses");
            presenter::handle_clear_responses(state, conn, question_id).await
        }

        ClientMessage::SetRoomStatus { status } => {
            check_presenter!(conn, "open or close the room");
            presenter::handle_set_room_status(state, conn, status).await
        }
    }
}
