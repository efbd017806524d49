//! Presenter-driven room transitions
//!
//! NoActiveQuestion -> ActiveQuestionHidden <-> ActiveQuestionShown, with
//! `close` returning to NoActiveQuestion from anywhere. Each transition is a
//! single commit, so observers never see half of one.

use super::response::upsert_response;
use super::AppState;
use crate::error::{PollError, PollResult};
use crate::tally::TallyReport;
use crate::types::*;

impl AppState {
    /// Present a question with results hidden. Re-activating the current
    /// question hides its results again.
    pub async fn activate_question(&self, code: &str, question_id: &str) -> PollResult<Room> {
        self.ensure_available()?;
        let mut rooms = self.rooms.write().await;
        let record = rooms.get_mut(code).ok_or(PollError::RoomNotFound)?;
        if !record.questions.contains_key(question_id) {
            return Err(PollError::QuestionNotFound);
        }

        let previous = record.room.active_question_id.replace(question_id.to_string());
        record.room.show_results = false;
        record.publish_room();

        tracing::info!(
            "Room {}: activated question {} (previous: {:?})",
            code,
            question_id,
            previous
        );
        Ok(record.room.clone())
    }

    /// Flip result visibility for the active question
    pub async fn toggle_results(&self, code: &str) -> PollResult<Room> {
        self.ensure_available()?;
        let mut rooms = self.rooms.write().await;
        let record = rooms.get_mut(code).ok_or(PollError::RoomNotFound)?;
        if record.room.active_question_id.is_none() {
            tracing::warn!("Room {}: toggle_results with no active question", code);
            return Err(PollError::NoActiveQuestion);
        }

        record.room.show_results = !record.room.show_results;
        record.publish_room();

        tracing::info!("Room {}: {:?}", code, record.room.phase());
        Ok(record.room.clone())
    }

    /// Stop presenting. Publishes nothing if no question was active.
    pub async fn close_question(&self, code: &str) -> PollResult<Room> {
        self.ensure_available()?;
        let mut rooms = self.rooms.write().await;
        let record = rooms.get_mut(code).ok_or(PollError::RoomNotFound)?;

        if record.room.active_question_id.is_some() || record.room.show_results {
            record.room.active_question_id = None;
            record.room.show_results = false;
            record.publish_room();
            tracing::info!("Room {}: closed active question", code);
        }
        Ok(record.room.clone())
    }

    /// Delete a question and its responses. Deleting the active question
    /// closes it first, in the same commit.
    pub async fn delete_question(&self, code: &str, question_id: &str) -> PollResult<()> {
        self.remove_question(code, question_id).await
    }

    pub async fn set_room_status(&self, code: &str, status: RoomStatus) -> PollResult<Room> {
        tracing::info!("Room {}: status -> {:?}", code, status);
        self.update_room(
            code,
            RoomPatch {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    /// Participant submission path: accepted only while `question_id` is the
    /// active question, checked in the same commit as the upsert
    pub async fn submit_to_active_question(
        &self,
        code: &str,
        question_id: &str,
        participant_id: &str,
        selected_options: Vec<String>,
    ) -> PollResult<Response> {
        self.ensure_available()?;
        let mut rooms = self.rooms.write().await;
        let record = rooms.get_mut(code).ok_or(PollError::RoomNotFound)?;
        match record.room.active_question_id.as_deref() {
            None => return Err(PollError::NoActiveQuestion),
            Some(active) if active != question_id => {
                return Err(PollError::InvalidResponse(
                    "Question is no longer active".to_string(),
                ))
            }
            Some(_) => {}
        }
        upsert_response(record, question_id, participant_id, selected_options)
    }

    /// Tallies for the active question, read in one consistent pass.
    /// `None` when nothing is active.
    pub async fn active_tallies(&self, code: &str) -> PollResult<Option<TallyReport>> {
        self.ensure_available()?;
        let rooms = self.rooms.read().await;
        let record = rooms.get(code).ok_or(PollError::RoomNotFound)?;
        let report = record
            .room
            .active_question_id
            .as_ref()
            .and_then(|id| record.questions.get(id))
            .map(|entry| TallyReport::build(&entry.question, &entry.response_list()));
        Ok(report)
    }
}
