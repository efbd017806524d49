use super::{AppState, RoomRecord};
use crate::error::{PollError, PollResult};
use crate::subscription::Subscription;
use crate::types::*;

/// Drop repeated selections, keeping first-seen order
fn dedup_selection(selected: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(selected.len());
    for option in selected {
        if !out.contains(&option) {
            out.push(option);
        }
    }
    out
}

/// Upsert into a locked room record and publish the question's new set
pub(super) fn upsert_response(
    record: &mut RoomRecord,
    question_id: &str,
    participant_id: &str,
    selected_options: Vec<String>,
) -> PollResult<Response> {
    if participant_id.trim().is_empty() {
        return Err(PollError::InvalidResponse(
            "Missing participant id".to_string(),
        ));
    }
    if record.room.status == RoomStatus::Closed {
        return Err(PollError::RoomClosed);
    }
    let entry = record
        .questions
        .get_mut(question_id)
        .ok_or(PollError::QuestionNotFound)?;

    let selected_options = dedup_selection(selected_options);
    match (entry.question.kind, selected_options.len()) {
        (_, 0) => {
            return Err(PollError::InvalidResponse(
                "Select at least one option".to_string(),
            ))
        }
        (QuestionKind::Single, n) if n > 1 => {
            return Err(PollError::InvalidResponse(
                "Single-choice questions take exactly one option".to_string(),
            ))
        }
        _ => {}
    }

    let response = Response {
        question_id: question_id.to_string(),
        participant_id: participant_id.to_string(),
        selected_options,
        submitted_at: chrono::Utc::now().to_rfc3339(),
    };
    let replaced = entry
        .responses
        .insert(participant_id.to_string(), response.clone())
        .is_some();
    entry.publish_responses();

    tracing::debug!(
        "Response from {} to {} in room {} ({})",
        participant_id,
        question_id,
        record.room.code,
        if replaced { "replaced" } else { "new" }
    );
    Ok(response)
}

impl AppState {
    /// Upsert the participant's response to a question (last write wins).
    ///
    /// Selections are not checked against the question's current options;
    /// tallies ignore anything that is not an option.
    pub async fn submit_response(
        &self,
        code: &str,
        question_id: &str,
        participant_id: &str,
        selected_options: Vec<String>,
    ) -> PollResult<Response> {
        self.ensure_available()?;
        let mut rooms = self.rooms.write().await;
        let record = rooms.get_mut(code).ok_or(PollError::RoomNotFound)?;
        upsert_response(record, question_id, participant_id, selected_options)
    }

    /// Delete every response to a question. Returns how many were removed;
    /// an already-empty set is left alone and publishes nothing.
    pub async fn clear_responses(&self, code: &str, question_id: &str) -> PollResult<usize> {
        self.ensure_available()?;
        let mut rooms = self.rooms.write().await;
        let record = rooms.get_mut(code).ok_or(PollError::RoomNotFound)?;
        let entry = record
            .questions
            .get_mut(question_id)
            .ok_or(PollError::QuestionNotFound)?;

        let cleared = entry.responses.len();
        if cleared == 0 {
            return Ok(0);
        }
        entry.responses.clear();
        entry.publish_responses();

        tracing::info!(
            "Cleared {} responses for question {} in room {}",
            cleared,
            question_id,
            code
        );
        Ok(cleared)
    }

    pub async fn get_responses(&self, code: &str, question_id: &str) -> PollResult<Vec<Response>> {
        self.ensure_available()?;
        let rooms = self.rooms.read().await;
        let record = rooms.get(code).ok_or(PollError::RoomNotFound)?;
        record
            .questions
            .get(question_id)
            .map(|q| q.response_list())
            .ok_or(PollError::QuestionNotFound)
    }

    /// Observe the response set of one question. Each question has its own
    /// scope, so switching questions means taking a new subscription.
    pub async fn subscribe_responses(
        &self,
        code: &str,
        question_id: &str,
    ) -> PollResult<Subscription<Vec<Response>>> {
        self.ensure_available()?;
        let rooms = self.rooms.read().await;
        let record = rooms.get(code).ok_or(PollError::RoomNotFound)?;
        let entry = record
            .questions
            .get(question_id)
            .ok_or(PollError::QuestionNotFound)?;
        Ok(entry.topic.subscribe(entry.response_list()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::SubscriptionError;
    use crate::tally::compute_tallies;

    async fn setup(kind: QuestionKind) -> (AppState, Question) {
        let state = AppState::new();
        state.create_room("ABCD", "").await.unwrap();
        let question = state
            .add_question(
                "ABCD",
                QuestionDraft {
                    text: "Color?".to_string(),
                    kind,
                    options: vec!["Red".to_string(), "Blue".to_string()],
                },
            )
            .await
            .unwrap();
        (state, question)
    }

    fn opts(options: &[&str]) -> Vec<String> {
        options.iter().map(|o| o.to_string()).collect()
    }

    #[tokio::test]
    async fn test_resubmission_overwrites() {
        let (state, q) = setup(QuestionKind::Single).await;

        state
            .submit_response("ABCD", &q.id, "p1", opts(&["Red"]))
            .await
            .unwrap();
        state
            .submit_response("ABCD", &q.id, "p1", opts(&["Blue"]))
            .await
            .unwrap();

        let responses = state.get_responses("ABCD", &q.id).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].participant_id, "p1");
        assert_eq!(responses[0].selected_options, vec!["Blue"]);
    }

    #[tokio::test]
    async fn test_concurrent_participants_do_not_collide() {
        let (state, q) = setup(QuestionKind::Single).await;

        let mut handles = Vec::new();
        for i in 0..50 {
            let state = state.clone();
            let qid = q.id.clone();
            handles.push(tokio::spawn(async move {
                let pick = if i % 2 == 0 { "Red" } else { "Blue" };
                state
                    .submit_response("ABCD", &qid, &format!("p{}", i), vec![pick.to_string()])
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let responses = state.get_responses("ABCD", &q.id).await.unwrap();
        assert_eq!(responses.len(), 50);
        let tallies = compute_tallies(&q, &responses);
        assert_eq!(tallies["Red"], 25);
        assert_eq!(tallies["Blue"], 25);
    }

    #[tokio::test]
    async fn test_selection_cardinality() {
        let (state, single) = setup(QuestionKind::Single).await;
        let result = state
            .submit_response("ABCD", &single.id, "p1", opts(&["Red", "Blue"]))
            .await;
        assert!(matches!(result, Err(PollError::InvalidResponse(_))));

        let result = state.submit_response("ABCD", &single.id, "p1", vec![]).await;
        assert!(matches!(result, Err(PollError::InvalidResponse(_))));

        // Duplicates collapse to one selection
        let response = state
            .submit_response("ABCD", &single.id, "p1", opts(&["Red", "Red"]))
            .await
            .unwrap();
        assert_eq!(response.selected_options, vec!["Red"]);

        let (state, multi) = setup(QuestionKind::Multi).await;
        let response = state
            .submit_response("ABCD", &multi.id, "p1", opts(&["Red", "Blue"]))
            .await
            .unwrap();
        assert_eq!(response.selected_options.len(), 2);
    }

    #[tokio::test]
    async fn test_store_does_not_check_option_membership() {
        let (state, q) = setup(QuestionKind::Single).await;
        state
            .submit_response("ABCD", &q.id, "p1", opts(&["Green"]))
            .await
            .unwrap();

        let responses = state.get_responses("ABCD", &q.id).await.unwrap();
        let tallies = compute_tallies(&q, &responses);
        assert_eq!(tallies["Red"], 0);
        assert!(!tallies.contains_key("Green"));
    }

    #[tokio::test]
    async fn test_closed_room_rejects_responses() {
        let (state, q) = setup(QuestionKind::Single).await;
        state
            .update_room(
                "ABCD",
                RoomPatch {
                    status: Some(RoomStatus::Closed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let result = state
            .submit_response("ABCD", &q.id, "p1", opts(&["Red"]))
            .await;
        assert_eq!(result.unwrap_err(), PollError::RoomClosed);
    }

    #[tokio::test]
    async fn test_clear_then_subscribe_is_empty() {
        let (state, q) = setup(QuestionKind::Single).await;
        state
            .submit_response("ABCD", &q.id, "p1", opts(&["Red"]))
            .await
            .unwrap();
        state
            .submit_response("ABCD", &q.id, "p2", opts(&["Blue"]))
            .await
            .unwrap();

        assert_eq!(state.clear_responses("ABCD", &q.id).await.unwrap(), 2);
        // Clearing again is a no-op, not an error
        assert_eq!(state.clear_responses("ABCD", &q.id).await.unwrap(), 0);

        let mut sub = state.subscribe_responses("ABCD", &q.id).await.unwrap();
        let responses = sub.recv().await.unwrap();
        assert!(responses.is_empty());

        let tallies = compute_tallies(&q, &responses);
        assert!(tallies.values().all(|&c| c == 0));
        assert_eq!(responses.len(), 0);
    }

    #[tokio::test]
    async fn test_subscription_tracks_response_set() {
        let (state, q) = setup(QuestionKind::Single).await;
        let mut sub = state.subscribe_responses("ABCD", &q.id).await.unwrap();
        assert!(sub.recv().await.unwrap().is_empty());

        state
            .submit_response("ABCD", &q.id, "p1", opts(&["Red"]))
            .await
            .unwrap();
        assert_eq!(sub.recv().await.unwrap().len(), 1);

        state
            .submit_response("ABCD", &q.id, "p2", opts(&["Blue"]))
            .await
            .unwrap();
        assert_eq!(sub.recv().await.unwrap().len(), 2);

        state.clear_responses("ABCD", &q.id).await.unwrap();
        assert!(sub.recv().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_question_closes_response_scope() {
        let (state, q) = setup(QuestionKind::Single).await;
        state
            .submit_response("ABCD", &q.id, "p1", opts(&["Red"]))
            .await
            .unwrap();
        let mut sub = state.subscribe_responses("ABCD", &q.id).await.unwrap();
        assert_eq!(sub.recv().await.unwrap().len(), 1);

        state.remove_question("ABCD", &q.id).await.unwrap();

        assert!(sub.recv().await.unwrap().is_empty());
        assert_eq!(sub.recv().await, Err(SubscriptionError::ScopeClosed));
        assert_eq!(
            state.get_responses("ABCD", &q.id).await.unwrap_err(),
            PollError::QuestionNotFound
        );
    }

    #[tokio::test]
    async fn test_scopes_are_isolated_per_question() {
        let (state, q1) = setup(QuestionKind::Single).await;
        let q2 = state
            .add_question(
                "ABCD",
                QuestionDraft {
                    text: "Other?".to_string(),
                    kind: QuestionKind::Single,
                    options: opts(&["Yes", "No"]),
                },
            )
            .await
            .unwrap();

        let mut sub2 = state.subscribe_responses("ABCD", &q2.id).await.unwrap();
        assert!(sub2.recv().await.unwrap().is_empty());

        state
            .submit_response("ABCD", &q1.id, "p1", opts(&["Red"]))
            .await
            .unwrap();
        state
            .submit_response("ABCD", &q2.id, "p1", opts(&["Yes"]))
            .await
            .unwrap();

        let next = sub2.recv().await.unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].question_id, q2.id);
    }
}
