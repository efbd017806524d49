use std::collections::{BTreeMap, HashSet};

use super::{AppState, QuestionRecord};
use crate::error::{PollError, PollResult};
use crate::subscription::{Subscription, Topic};
use crate::types::*;

/// Trim and check a question draft. Returns the cleaned draft; nothing is
/// stored unless this succeeds.
pub fn validate_draft(draft: QuestionDraft) -> PollResult<QuestionDraft> {
    let text = draft.text.trim().to_string();
    if text.is_empty() {
        return Err(PollError::InvalidQuestion(
            "Question text cannot be empty".to_string(),
        ));
    }
    if text.chars().count() > MAX_QUESTION_CHARS {
        return Err(PollError::InvalidQuestion(format!(
            "Question text exceeds {} characters",
            MAX_QUESTION_CHARS
        )));
    }

    let options: Vec<String> = draft
        .options
        .iter()
        .map(|o| o.trim().to_string())
        .collect();

    if options.iter().any(|o| o.is_empty()) {
        return Err(PollError::InvalidQuestion(
            "Options cannot be blank".to_string(),
        ));
    }
    if options.len() < MIN_OPTIONS || options.len() > MAX_OPTIONS {
        return Err(PollError::InvalidQuestion(format!(
            "A question needs between {} and {} options, got {}",
            MIN_OPTIONS,
            MAX_OPTIONS,
            options.len()
        )));
    }
    if let Some(long) = options
        .iter()
        .find(|o| o.chars().count() > MAX_OPTION_CHARS)
    {
        return Err(PollError::InvalidQuestion(format!(
            "Option '{}…' exceeds {} characters",
            long.chars().take(20).collect::<String>(),
            MAX_OPTION_CHARS
        )));
    }

    let mut seen = HashSet::new();
    for option in &options {
        if !seen.insert(option.as_str()) {
            return Err(PollError::InvalidQuestion(format!(
                "Duplicate option '{}'",
                option
            )));
        }
    }

    Ok(QuestionDraft {
        text,
        kind: draft.kind,
        options,
    })
}

impl AppState {
    /// Add a question. Its `order` comes from the room's sequence counter,
    /// so questions sort strictly in creation order.
    pub async fn add_question(&self, code: &str, draft: QuestionDraft) -> PollResult<Question> {
        self.insert_question(code, ulid::Ulid::new().to_string(), draft)
            .await
    }

    /// Store a question under a caller-chosen id; `AlreadyExists` if the
    /// room already has one with that id.
    pub(crate) async fn insert_question(
        &self,
        code: &str,
        id: QuestionId,
        draft: QuestionDraft,
    ) -> PollResult<Question> {
        self.ensure_available()?;
        let draft = validate_draft(draft)?;

        let mut rooms = self.rooms.write().await;
        let record = rooms.get_mut(code).ok_or(PollError::RoomNotFound)?;
        if record.questions.contains_key(&id) {
            return Err(PollError::AlreadyExists);
        }

        let question = Question {
            id,
            text: draft.text,
            kind: draft.kind,
            options: draft.options,
            order: record.next_order,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        record.next_order += 1;

        record.questions.insert(
            question.id.clone(),
            QuestionRecord {
                question: question.clone(),
                responses: BTreeMap::new(),
                topic: Topic::new(self.channel_capacity),
            },
        );
        record.publish_questions();

        tracing::info!(
            "Added question {} to room {} (order {})",
            question.id,
            code,
            question.order
        );
        Ok(question)
    }

    /// Replace text, type and options; `id` and `order` are kept. Existing
    /// responses stay, selections of removed options are ignored by tallies.
    pub async fn update_question(
        &self,
        code: &str,
        question_id: &str,
        draft: QuestionDraft,
    ) -> PollResult<Question> {
        self.ensure_available()?;
        let draft = validate_draft(draft)?;

        let mut rooms = self.rooms.write().await;
        let record = rooms.get_mut(code).ok_or(PollError::RoomNotFound)?;
        let entry = record
            .questions
            .get_mut(question_id)
            .ok_or(PollError::QuestionNotFound)?;

        entry.question.text = draft.text;
        entry.question.kind = draft.kind;
        entry.question.options = draft.options;
        let question = entry.question.clone();

        record.publish_questions();
        tracing::info!("Updated question {} in room {}", question_id, code);
        Ok(question)
    }

    /// Remove a question together with its responses. If the room still
    /// points at it, the pointer is cleared in the same commit.
    ///
    /// Response observers get a final empty snapshot, then the scope closes.
    pub(crate) async fn remove_question(&self, code: &str, question_id: &str) -> PollResult<()> {
        self.ensure_available()?;
        let mut rooms = self.rooms.write().await;
        let record = rooms.get_mut(code).ok_or(PollError::RoomNotFound)?;
        let removed = record
            .questions
            .remove(question_id)
            .ok_or(PollError::QuestionNotFound)?;

        if record.room.active_question_id.as_deref() == Some(question_id) {
            record.room.active_question_id = None;
            record.room.show_results = false;
            record.publish_room();
        }

        removed.topic.publish(Vec::new());
        record.publish_questions();

        tracing::info!(
            "Deleted question {} from room {} ({} responses dropped)",
            question_id,
            code,
            removed.responses.len()
        );
        Ok(())
    }

    /// Questions of a room, sorted by `order`
    pub async fn get_questions(&self, code: &str) -> PollResult<Vec<Question>> {
        self.ensure_available()?;
        let rooms = self.rooms.read().await;
        let record = rooms.get(code).ok_or(PollError::RoomNotFound)?;
        Ok(record.question_list())
    }

    pub async fn get_question(&self, code: &str, question_id: &str) -> PollResult<Question> {
        self.ensure_available()?;
        let rooms = self.rooms.read().await;
        let record = rooms.get(code).ok_or(PollError::RoomNotFound)?;
        record
            .questions
            .get(question_id)
            .map(|q| q.question.clone())
            .ok_or(PollError::QuestionNotFound)
    }

    /// Observe the ordered question list of a room
    pub async fn subscribe_questions(&self, code: &str) -> PollResult<Subscription<Vec<Question>>> {
        self.ensure_available()?;
        let rooms = self.rooms.read().await;
        let record = rooms.get(code).ok_or(PollError::RoomNotFound)?;
        Ok(record.questions_topic.subscribe(record.question_list()))
    }
}
