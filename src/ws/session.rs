//! Per-connection view of a room
//!
//! Holds the latest snapshot of each scope the connection observes and turns
//! incoming snapshots into outbound messages. Knows nothing about sockets,
//! so the fan-out rules can be tested directly.

use crate::protocol::ServerMessage;
use crate::tally::TallyReport;
use crate::types::*;

#[derive(Debug)]
pub struct SessionView {
    role: Role,
    participant_id: Option<ParticipantId>,
    room: Option<Room>,
    questions: Vec<Question>,
    /// Responses of the question the connection is subscribed to
    responses: Option<(QuestionId, Vec<Response>)>,
    last_own_response: Option<Response>,
}

impl SessionView {
    pub fn new(role: Role, participant_id: Option<ParticipantId>) -> Self {
        Self {
            role,
            participant_id,
            room: None,
            questions: Vec::new(),
            responses: None,
            last_own_response: None,
        }
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    /// The active question, if its document has arrived. A room pointing at
    /// a question this view has not seen yet counts as no active question.
    pub fn active_question(&self) -> Option<&Question> {
        let id = self.room.as_ref()?.active_question_id.as_ref()?;
        self.questions.iter().find(|q| &q.id == id)
    }

    /// Response scope this connection should be subscribed to
    pub fn wanted_scope(&self) -> Option<QuestionId> {
        self.room.as_ref()?.active_question_id.clone()
    }

    /// Called when the connection swaps its response subscription. Anything
    /// cached for the previous scope is dropped.
    pub fn switch_scope(&mut self) {
        self.responses = None;
        self.last_own_response = None;
    }

    pub fn on_room(&mut self, room: Room) -> Vec<ServerMessage> {
        let results_revealed = room.show_results
            && !self.room.as_ref().map(|r| r.show_results).unwrap_or(false);
        self.room = Some(room.clone());

        let mut out = vec![ServerMessage::Room { room }];
        if results_revealed && self.role == Role::Participant {
            out.extend(self.tallies());
        }
        out
    }

    pub fn on_questions(&mut self, list: Vec<Question>) -> Vec<ServerMessage> {
        let before = self.active_question().cloned();
        self.questions = list.clone();
        let after = self.active_question().cloned();

        let mut out = vec![ServerMessage::Questions { list }];
        // An edit to the active question changes its option set
        let active_changed = match (&before, &after) {
            (Some(b), Some(a)) => b.options != a.options,
            (None, Some(_)) => true,
            _ => false,
        };
        if active_changed && self.sees_tallies() {
            out.extend(self.tallies());
        }
        out
    }

    /// Apply a response snapshot. Snapshots for a scope other than the
    /// active one are stale and dropped.
    pub fn on_responses(&mut self, question_id: QuestionId, list: Vec<Response>) -> Vec<ServerMessage> {
        if self.wanted_scope().as_ref() != Some(&question_id) {
            tracing::debug!("Dropping stale responses for {}", question_id);
            return Vec::new();
        }

        let mut out = Vec::new();
        if let Some(pid) = &self.participant_id {
            let own = list.iter().find(|r| &r.participant_id == pid).cloned();
            if own != self.last_own_response {
                self.last_own_response = own.clone();
                out.push(ServerMessage::MyResponse { response: own });
            }
        }

        if self.role == Role::Presenter {
            out.push(ServerMessage::Responses {
                question_id: question_id.clone(),
                list: list.clone(),
            });
        }
        self.responses = Some((question_id, list));

        if self.sees_tallies() {
            out.extend(self.tallies());
        }
        out
    }

    fn sees_tallies(&self) -> bool {
        match self.role {
            Role::Presenter => true,
            Role::Participant => self.room.as_ref().map(|r| r.show_results).unwrap_or(false),
        }
    }

    /// Fresh tallies for the active question, if both the question and its
    /// responses are known
    pub fn tallies(&self) -> Option<ServerMessage> {
        let question = self.active_question()?;
        let (scope, responses) = self.responses.as_ref()?;
        if scope != &question.id {
            return None;
        }
        Some(ServerMessage::Tallies {
            report: TallyReport::build(question, responses),
        })
    }
}
