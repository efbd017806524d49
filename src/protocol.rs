use crate::tally::TallyReport;
use crate::types::*;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    // Presenter-only messages
    /// Unlock presenter commands for this connection
    Unlock {
        password: String,
    },
    AddQuestion {
        question: QuestionDraft,
    },
    UpdateQuestion {
        question_id: QuestionId,
        question: QuestionDraft,
    },
    DeleteQuestion {
        question_id: QuestionId,
    },
    ActivateQuestion {
        question_id: QuestionId,
    },
    ToggleResults,
    CloseQuestion,
    ClearResponses {
        question_id: QuestionId,
    },
    SetRoomStatus {
        status: RoomStatus,
    },
    // Participant messages
    /// Answer the currently active question
    SubmitResponse {
        question_id: QuestionId,
        selected_options: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        role: Role,
        room: Room,
        /// Identity to reuse for the rest of the tab's lifetime
        participant_id: Option<ParticipantId>,
        presenter_unlocked: bool,
        server_now: String,
    },
    /// Full room snapshot
    Room {
        room: Room,
    },
    /// Full ordered question list
    Questions {
        list: Vec<Question>,
    },
    /// Full response set of the active question (presenter only)
    Responses {
        question_id: QuestionId,
        list: Vec<Response>,
    },
    Tallies {
        report: TallyReport,
    },
    /// The participant's own stored answer to the active question
    MyResponse {
        response: Option<Response>,
    },
    Unlocked,
    QuestionCreated {
        question: Question,
    },
    ResponseAck {
        question_id: QuestionId,
    },
    ResponsesCleared {
        question_id: QuestionId,
        count: usize,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn error(code: impl Into<String>, msg: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.into(),
            msg: msg.into(),
        }
    }
}

impl From<crate::error::PollError> for ServerMessage {
    fn from(e: crate::error::PollError) -> Self {
        ServerMessage::error(e.code(), e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PollError;

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"t":"add_question","question":{"text":"Color?","type":"single","options":["Red","Blue"]}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::AddQuestion { question } => {
                assert_eq!(question.kind, QuestionKind::Single);
                assert_eq!(question.options.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }

        let msg: ClientMessage = serde_json::from_str(r#"{"t":"toggle_results"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::ToggleResults));
    }

    #[test]
    fn test_error_from_poll_error() {
        let msg: ServerMessage = PollError::NoActiveQuestion.into();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["t"], "error");
        assert_eq!(json["code"], "NO_ACTIVE_QUESTION");
    }
}
