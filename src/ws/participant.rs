//! Participant message handlers

use super::handlers::Connection;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::QuestionId;
use std::sync::Arc;

pub async fn handle_submit_response(
    state: &Arc<AppState>,
    conn: &Connection,
    question_id: QuestionId,
    selected_options: Vec<String>,
) -> Option<ServerMessage> {
    let Some(participant_id) = conn.participant_id.as_deref() else {
        return Some(ServerMessage::error(
            "UNAUTHORIZED",
            "Only participants can submit responses",
        ));
    };

    match state
        .submit_to_active_question(&conn.code, &question_id, participant_id, selected_options)
        .await
    {
        Ok(_) => Some(ServerMessage::ResponseAck { question_id }),
        Err(e) => {
            tracing::debug!(
                "Response from {} to {} rejected: {}",
                participant_id,
                question_id,
                e
            );
            Some(e.into())
        }
    }
}
