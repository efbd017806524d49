mod controller;
mod question;
mod response;
mod room;

pub use question::validate_draft;

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::PresenterSecret;
use crate::code::{CodeAllocator, RoomDirectory};
use crate::error::{PollError, PollResult};
use crate::subscription::Topic;
use crate::types::*;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// One room and everything nested under it. Each scope owns its topic, so
/// removing a record closes its subscriptions.
pub(crate) struct RoomRecord {
    pub(crate) room: Room,
    pub(crate) secret: Option<PresenterSecret>,
    pub(crate) questions: HashMap<QuestionId, QuestionRecord>,
    pub(crate) next_order: u64,
    pub(crate) room_topic: Topic<Room>,
    pub(crate) questions_topic: Topic<Vec<Question>>,
}

impl RoomRecord {
    /// Questions sorted ascending by `order`
    pub(crate) fn question_list(&self) -> Vec<Question> {
        let mut list: Vec<Question> = self
            .questions
            .values()
            .map(|record| record.question.clone())
            .collect();
        list.sort_by_key(|q| q.order);
        list
    }

    pub(crate) fn publish_room(&self) {
        self.room_topic.publish(self.room.clone());
    }

    pub(crate) fn publish_questions(&self) {
        self.questions_topic.publish(self.question_list());
    }
}

pub(crate) struct QuestionRecord {
    pub(crate) question: Question,
    pub(crate) responses: BTreeMap<ParticipantId, Response>,
    pub(crate) topic: Topic<Vec<Response>>,
}

impl QuestionRecord {
    pub(crate) fn response_list(&self) -> Vec<Response> {
        self.responses.values().cloned().collect()
    }

    pub(crate) fn publish_responses(&self) {
        self.topic.publish(self.response_list());
    }
}

/// Shared application state: the only mutable resource shared between
/// connections. Every mutation takes the write lock, applies completely or
/// not at all, and publishes the affected snapshots before releasing it.
#[derive(Clone)]
pub struct AppState {
    pub(crate) rooms: Arc<RwLock<HashMap<RoomCode, RoomRecord>>>,
    pub(crate) allocator: CodeAllocator,
    pub(crate) channel_capacity: usize,
    available: Arc<AtomicBool>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_allocator(CodeAllocator::default(), DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_allocator(allocator: CodeAllocator, channel_capacity: usize) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            allocator,
            channel_capacity,
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn ensure_available(&self) -> PollResult<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(PollError::StoreUnavailable(
                "store is shutting down".to_string(),
            ))
        }
    }

    /// Stop accepting operations and close every open subscription
    pub async fn shutdown(&self) {
        self.available.store(false, Ordering::Release);
        let mut rooms = self.rooms.write().await;
        tracing::info!("Shutting down store with {} rooms", rooms.len());
        rooms.clear();
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomDirectory for AppState {
    async fn room_exists(&self, code: &str) -> bool {
        self.rooms.read().await.contains_key(code)
    }
}
