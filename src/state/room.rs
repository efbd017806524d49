use std::collections::HashMap;

use super::{AppState, RoomRecord};
use crate::auth::PresenterSecret;
use crate::code::RoomDirectory;
use crate::error::{PollError, PollResult};
use crate::subscription::{Subscription, Topic};
use crate::types::*;

impl AppState {
    /// Create-if-absent: the existence check and the insert happen under one
    /// write lock, so two creators can never both claim `code`.
    pub async fn create_room(&self, code: &str, presenter_password: &str) -> PollResult<Room> {
        self.ensure_available()?;
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(code) {
            return Err(PollError::AlreadyExists);
        }

        let secret = PresenterSecret::from_password(presenter_password);
        let room = Room {
            code: code.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            active_question_id: None,
            show_results: false,
            status: RoomStatus::Open,
            password_protected: secret.is_some(),
        };

        let record = RoomRecord {
            room: room.clone(),
            secret,
            questions: HashMap::new(),
            next_order: 1,
            room_topic: Topic::new(self.channel_capacity),
            questions_topic: Topic::new(self.channel_capacity),
        };
        rooms.insert(code.to_string(), record);

        tracing::info!(
            "Created room {} (password protected: {})",
            code,
            room.password_protected
        );
        Ok(room)
    }

    /// Allocate a fresh code and create the room under it. A code that was
    /// claimed between allocation and insert counts as a collision and costs
    /// one attempt from the same budget.
    pub async fn create_room_with_allocation(&self, presenter_password: &str) -> PollResult<Room> {
        self.create_room_checked_by(self, presenter_password).await
    }

    pub(crate) async fn create_room_checked_by(
        &self,
        directory: &dyn RoomDirectory,
        presenter_password: &str,
    ) -> PollResult<Room> {
        let budget = self.allocator.max_attempts();
        for attempt in 1..=budget {
            let code = self.allocator.allocate(directory).await?;
            match self.create_room(&code, presenter_password).await {
                Ok(room) => return Ok(room),
                Err(PollError::AlreadyExists) => {
                    tracing::warn!(
                        "{} on {} (attempt {}/{}), retrying",
                        PollError::CodeCollision,
                        code,
                        attempt,
                        budget
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Err(PollError::CapacityExhausted { attempts: budget })
    }

    pub async fn get_room(&self, code: &str) -> PollResult<Room> {
        self.ensure_available()?;
        self.rooms
            .read()
            .await
            .get(code)
            .map(|record| record.room.clone())
            .ok_or(PollError::RoomNotFound)
    }

    /// Merge `patch` into the room. A patch pointing the room at a question
    /// it does not contain is rejected as a whole.
    pub async fn update_room(&self, code: &str, patch: RoomPatch) -> PollResult<Room> {
        self.ensure_available()?;
        let mut rooms = self.rooms.write().await;
        let record = rooms.get_mut(code).ok_or(PollError::RoomNotFound)?;

        if let Some(Some(ref question_id)) = patch.active_question_id {
            if !record.questions.contains_key(question_id) {
                return Err(PollError::QuestionNotFound);
            }
        }

        if patch.is_empty() {
            return Ok(record.room.clone());
        }

        if let Some(show) = patch.show_results {
            record.room.show_results = show;
        }
        if let Some(active) = patch.active_question_id {
            // Results are only ever shown for an active question
            if active.is_none() {
                record.room.show_results = false;
            }
            record.room.active_question_id = active;
        }
        if let Some(status) = patch.status {
            record.room.status = status;
        }

        record.publish_room();
        tracing::debug!("Room {} updated: {:?}", code, record.room.phase());
        Ok(record.room.clone())
    }

    /// Observe the room document: current state first, then every change
    pub async fn subscribe_room(&self, code: &str) -> PollResult<Subscription<Room>> {
        self.ensure_available()?;
        let rooms = self.rooms.read().await;
        let record = rooms.get(code).ok_or(PollError::RoomNotFound)?;
        Ok(record.room_topic.subscribe(record.room.clone()))
    }

    /// Server-side presenter password check. Rooms without a password
    /// accept anything.
    pub async fn verify_presenter(&self, code: &str, password: &str) -> PollResult<bool> {
        self.ensure_available()?;
        let rooms = self.rooms.read().await;
        let record = rooms.get(code).ok_or(PollError::RoomNotFound)?;
        let accepted = match &record.secret {
            Some(secret) => secret.verify(password),
            None => true,
        };
        if !accepted {
            tracing::warn!(
                "Rejected presenter password for room {} (secret {})",
                code,
                record
                    .secret
                    .as_ref()
                    .map(|s| s.fingerprint())
                    .unwrap_or_default()
            );
        }
        Ok(accepted)
    }
}
