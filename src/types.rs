use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type RoomCode = String;
pub type QuestionId = String;
pub type ParticipantId = String;

/// Allowed number of options per question
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;

pub const MAX_QUESTION_CHARS: usize = 500;
pub const MAX_OPTION_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Single,
    Multi,
}

/// Derived view of a room from the presenter's point of view
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomPhase {
    NoActiveQuestion,
    ActiveQuestionHidden,
    ActiveQuestionShown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub code: RoomCode,
    pub created_at: String,
    pub active_question_id: Option<QuestionId>,
    pub show_results: bool,
    pub status: RoomStatus,
    /// Whether presenter commands require unlocking first.
    /// The secret itself never leaves the server.
    pub password_protected: bool,
}

impl Room {
    pub fn phase(&self) -> RoomPhase {
        match (&self.active_question_id, self.show_results) {
            (None, _) => RoomPhase::NoActiveQuestion,
            (Some(_), false) => RoomPhase::ActiveQuestionHidden,
            (Some(_), true) => RoomPhase::ActiveQuestionShown,
        }
    }
}

/// Partial room update; `None` fields are left untouched.
///
/// `active_question_id` is doubly optional: `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct RoomPatch {
    pub active_question_id: Option<Option<QuestionId>>,
    pub show_results: Option<bool>,
    pub status: Option<RoomStatus>,
}

impl RoomPatch {
    pub fn is_empty(&self) -> bool {
        self.active_question_id.is_none() && self.show_results.is_none() && self.status.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub options: Vec<String>,
    /// Per-room sequence number, strictly increasing in creation order
    pub order: u64,
    pub created_at: String,
}

/// Presenter-supplied question content, validated before it is stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub question_id: QuestionId,
    pub participant_id: ParticipantId,
    pub selected_options: Vec<String>,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Presenter,
    Participant,
}
