/// Result type for store and controller operations
pub type PollResult<T> = Result<T, PollError>;

/// Errors surfaced to the caller of a mutating or reading operation.
/// None of these are retried internally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Question not found")]
    QuestionNotFound,

    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("A room with this code already exists")]
    AlreadyExists,

    #[error("Room code was taken between check and create")]
    CodeCollision,

    #[error("No free room code found after {attempts} attempts")]
    CapacityExhausted { attempts: usize },

    #[error("No question is active")]
    NoActiveQuestion,

    #[error("Room is closed")]
    RoomClosed,

    #[error("Presenter access required")]
    Unauthorized,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl PollError {
    /// Stable code used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            PollError::RoomNotFound => "ROOM_NOT_FOUND",
            PollError::QuestionNotFound => "QUESTION_NOT_FOUND",
            PollError::InvalidQuestion(_) => "INVALID_QUESTION",
            PollError::InvalidResponse(_) => "INVALID_RESPONSE",
            PollError::AlreadyExists => "ALREADY_EXISTS",
            PollError::CodeCollision => "CODE_COLLISION",
            PollError::CapacityExhausted { .. } => "CAPACITY_EXHAUSTED",
            PollError::NoActiveQuestion => "NO_ACTIVE_QUESTION",
            PollError::RoomClosed => "ROOM_CLOSED",
            PollError::Unauthorized => "UNAUTHORIZED",
            PollError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PollError::RoomNotFound | PollError::QuestionNotFound)
    }
}
