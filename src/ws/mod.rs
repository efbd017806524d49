pub mod handlers;
mod participant;
mod presenter;
pub mod session;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::code::normalize_code;
use crate::error::PollResult;
use crate::protocol::{ClientMessage, ServerMessage, PROTOCOL_VERSION};
use crate::state::AppState;
use crate::subscription::{Subscription, SubscriptionError};
use crate::types::{QuestionId, Response, Role};
use handlers::Connection;
use session::SessionView;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room: Option<String>,
    pub role: Option<String>,
    /// Identity a participant tab already holds, reused across reconnects
    pub participant_id: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(
        "WebSocket connection request: room={:?}, role={:?}",
        params.room,
        params.role
    );

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

type WsSender = SplitSink<WebSocket, Message>;

async fn send_msg(sender: &mut WsSender, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            true
        }
    }
}

async fn send_all(sender: &mut WsSender, msgs: Vec<ServerMessage>) -> bool {
    for msg in &msgs {
        if !send_msg(sender, msg).await {
            return false;
        }
    }
    true
}

fn subscription_error(scope: &str, e: SubscriptionError) -> ServerMessage {
    tracing::warn!("{} subscription: {}", scope, e);
    ServerMessage::error(e.code(), e.to_string())
}

/// The response subscription a connection currently holds, keyed by question
pub(crate) type ResponseScope = Option<(QuestionId, Subscription<Vec<Response>>)>;

async fn recv_responses(
    scope: &mut ResponseScope,
) -> (QuestionId, Result<Vec<Response>, SubscriptionError>) {
    match scope {
        Some((id, sub)) => (id.clone(), sub.recv().await),
        // No active question: wait forever
        None => std::future::pending().await,
    }
}

/// Point the response subscription at the view's active question. The old
/// scope is dropped before the new one is taken, so nothing from it reaches
/// the view afterwards. A question that cannot be found yet leaves the scope
/// empty; the next call retries.
pub(crate) async fn follow_active_question(
    state: &AppState,
    code: &str,
    view: &mut SessionView,
    scope: &mut ResponseScope,
) -> PollResult<()> {
    let wanted = view.wanted_scope();
    let current = scope.as_ref().map(|(id, _)| id.clone());
    if wanted == current {
        return Ok(());
    }

    *scope = None;
    view.switch_scope();
    if let Some(question_id) = wanted {
        match state.subscribe_responses(code, &question_id).await {
            Ok(sub) => *scope = Some((question_id, sub)),
            Err(e) if e.is_not_found() => {
                tracing::debug!("Active question {} not subscribable yet: {}", question_id, e);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let role = match params.role.as_deref() {
        Some("presenter") => Role::Presenter,
        _ => Role::Participant,
    };

    let Some(code) = params.room.as_deref().and_then(normalize_code) else {
        let error = ServerMessage::error("ROOM_NOT_FOUND", "Missing or malformed room code");
        send_msg(&mut sender, &error).await;
        return;
    };

    let room = match state.get_room(&code).await {
        Ok(room) => room,
        Err(e) => {
            tracing::warn!("WebSocket rejected for room {}: {}", code, e);
            send_msg(&mut sender, &ServerMessage::from(e)).await;
            return;
        }
    };

    let mut conn = match role {
        Role::Presenter => Connection::presenter(code.clone(), room.password_protected),
        Role::Participant => {
            let participant_id = params
                .participant_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| ulid::Ulid::new().to_string());
            Connection::participant(code.clone(), participant_id)
        }
    };

    tracing::info!(
        "WebSocket connected to room {} as {:?} ({:?})",
        code,
        conn.role,
        conn.participant_id
    );

    let welcome = ServerMessage::Welcome {
        protocol: PROTOCOL_VERSION.to_string(),
        role: conn.role.clone(),
        room,
        participant_id: conn.participant_id.clone(),
        presenter_unlocked: conn.gate.is_unlocked(),
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if !send_msg(&mut sender, &welcome).await {
        tracing::error!("Failed to send welcome message");
        return;
    }

    let (mut room_sub, mut questions_sub) = match (
        state.subscribe_room(&code).await,
        state.subscribe_questions(&code).await,
    ) {
        (Ok(r), Ok(q)) => (r, q),
        (Err(e), _) | (_, Err(e)) => {
            send_msg(&mut sender, &ServerMessage::from(e)).await;
            return;
        }
    };
    let mut responses_sub: ResponseScope = None;
    let mut view = SessionView::new(conn.role.clone(), conn.participant_id.clone());

    loop {
        tokio::select! {
            update = room_sub.recv() => {
                let sent = match update {
                    Ok(room) => send_all(&mut sender, view.on_room(room)).await,
                    Err(SubscriptionError::ScopeClosed) => {
                        send_msg(&mut sender, &subscription_error("Room", SubscriptionError::ScopeClosed)).await;
                        break;
                    }
                    Err(e) => send_msg(&mut sender, &subscription_error("Room", e)).await,
                };
                if !sent {
                    break;
                }
            }

            update = questions_sub.recv() => {
                let sent = match update {
                    Ok(list) => send_all(&mut sender, view.on_questions(list)).await,
                    Err(SubscriptionError::ScopeClosed) => {
                        send_msg(&mut sender, &subscription_error("Question", SubscriptionError::ScopeClosed)).await;
                        break;
                    }
                    Err(e) => send_msg(&mut sender, &subscription_error("Question", e)).await,
                };
                if !sent {
                    break;
                }
            }

            (question_id, update) = recv_responses(&mut responses_sub) => {
                let sent = match update {
                    Ok(list) => send_all(&mut sender, view.on_responses(question_id, list)).await,
                    Err(SubscriptionError::ScopeClosed) => {
                        // Question deleted; the room snapshot moves us on
                        tracing::debug!("Response scope {} closed", question_id);
                        responses_sub = None;
                        view.switch_scope();
                        true
                    }
                    Err(e) => send_msg(&mut sender, &subscription_error("Response", e)).await,
                };
                if !sent {
                    break;
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => handlers::handle_message(client_msg, &mut conn, &state).await,
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                Some(ServerMessage::error(
                                    "PARSE_ERROR",
                                    format!("Invalid message format: {}", e),
                                ))
                            }
                        };
                        if let Some(reply) = reply {
                            if !send_msg(&mut sender, &reply).await {
                                tracing::error!("Failed to send response");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }

        if let Err(e) = follow_active_question(&state, &code, &mut view, &mut responses_sub).await {
            send_msg(&mut sender, &ServerMessage::from(e)).await;
            break;
        }
    }

    tracing::info!(
        "WebSocket connection closed for room {} ({:?})",
        code,
        conn.role
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QuestionDraft, QuestionKind};
    use std::time::Duration;

    fn draft(text: &str) -> QuestionDraft {
        QuestionDraft {
            text: text.to_string(),
            kind: QuestionKind::Single,
            options: vec!["Red".to_string(), "Blue".to_string()],
        }
    }

    async fn nothing_pending(scope: &mut ResponseScope) -> bool {
        tokio::time::timeout(Duration::from_millis(20), recv_responses(scope))
            .await
            .is_err()
    }

    #[tokio::test]
    async fn test_switching_questions_drops_old_scope() {
        let state = AppState::new();
        state.create_room("ABCD", "").await.unwrap();
        let q1 = state.add_question("ABCD", draft("First?")).await.unwrap();
        let q2 = state.add_question("ABCD", draft("Second?")).await.unwrap();
        let mut view = SessionView::new(Role::Presenter, None);
        let mut scope: ResponseScope = None;

        state.activate_question("ABCD", &q1.id).await.unwrap();
        view.on_room(state.get_room("ABCD").await.unwrap());
        follow_active_question(&state, "ABCD", &mut view, &mut scope)
            .await
            .unwrap();
        assert_eq!(scope.as_ref().map(|(id, _)| id.as_str()), Some(q1.id.as_str()));
        let (id, list) = recv_responses(&mut scope).await;
        assert_eq!(id, q1.id);
        assert!(list.unwrap().is_empty());

        state.activate_question("ABCD", &q2.id).await.unwrap();
        // Still on q1 here; the switch discards this update
        state
            .submit_response("ABCD", &q1.id, "p1", vec!["Red".to_string()])
            .await
            .unwrap();
        view.on_room(state.get_room("ABCD").await.unwrap());
        follow_active_question(&state, "ABCD", &mut view, &mut scope)
            .await
            .unwrap();

        // Late q1 traffic never reaches the new scope
        state
            .submit_response("ABCD", &q1.id, "p2", vec!["Blue".to_string()])
            .await
            .unwrap();
        let (id, list) = recv_responses(&mut scope).await;
        assert_eq!(id, q2.id);
        assert!(list.unwrap().is_empty());
        assert!(nothing_pending(&mut scope).await);

        // Following again without a change keeps the same subscription
        follow_active_question(&state, "ABCD", &mut view, &mut scope)
            .await
            .unwrap();
        state
            .submit_response("ABCD", &q2.id, "p1", vec!["Red".to_string()])
            .await
            .unwrap();
        let (id, list) = recv_responses(&mut scope).await;
        assert_eq!(id, q2.id);
        assert_eq!(list.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_active_question_not_created_yet_is_retried() {
        let state = AppState::new();
        state.create_room("ABCD", "").await.unwrap();
        let mut view = SessionView::new(Role::Participant, Some("p1".to_string()));
        let mut scope: ResponseScope = None;

        // Room snapshot arrives ahead of the question it points at
        let mut room = state.get_room("ABCD").await.unwrap();
        room.active_question_id = Some("q-late".to_string());
        view.on_room(room);

        follow_active_question(&state, "ABCD", &mut view, &mut scope)
            .await
            .unwrap();
        assert!(scope.is_none());
        assert!(nothing_pending(&mut scope).await);

        state
            .insert_question("ABCD", "q-late".to_string(), draft("Late?"))
            .await
            .unwrap();
        follow_active_question(&state, "ABCD", &mut view, &mut scope)
            .await
            .unwrap();
        let (id, list) = recv_responses(&mut scope).await;
        assert_eq!(id, "q-late");
        assert!(list.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_question_scope_closes() {
        let state = AppState::new();
        state.create_room("ABCD", "").await.unwrap();
        let q = state.add_question("ABCD", draft("Gone?")).await.unwrap();
        state.activate_question("ABCD", &q.id).await.unwrap();
        state
            .submit_response("ABCD", &q.id, "p1", vec!["Red".to_string()])
            .await
            .unwrap();

        let mut view = SessionView::new(Role::Presenter, None);
        let mut scope: ResponseScope = None;
        view.on_room(state.get_room("ABCD").await.unwrap());
        follow_active_question(&state, "ABCD", &mut view, &mut scope)
            .await
            .unwrap();
        let (_, list) = recv_responses(&mut scope).await;
        assert_eq!(list.unwrap().len(), 1);

        state.delete_question("ABCD", &q.id).await.unwrap();

        let (_, list) = recv_responses(&mut scope).await;
        assert!(list.unwrap().is_empty());
        let (id, closed) = recv_responses(&mut scope).await;
        assert_eq!(id, q.id);
        assert_eq!(closed, Err(SubscriptionError::ScopeClosed));
        scope = None;
        view.switch_scope();

        // Before the room snapshot lands the question is simply not found
        follow_active_question(&state, "ABCD", &mut view, &mut scope)
            .await
            .unwrap();
        assert!(scope.is_none());

        view.on_room(state.get_room("ABCD").await.unwrap());
        assert_eq!(view.wanted_scope(), None);
        follow_active_question(&state, "ABCD", &mut view, &mut scope)
            .await
            .unwrap();
        assert!(scope.is_none());
        assert!(nothing_pending(&mut scope).await);
    }
}
