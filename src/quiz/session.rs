use serde::{Deserialize, Serialize};

use crate::trivia::error::Result as FetchResult;
use crate::trivia::{QuestionId, QuestionRecord};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum QuizPhase {
    Loading,
    Error { message: String },
    Answering,
    /// The score only exists once the quiz has been checked.
    Results { score: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Scored { score: u32, total: usize },
    Incomplete { unanswered: usize },
    /// Nothing to check: still loading or halted on an error.
    NotReady,
}

/// Read-only view of one question, as handed to the presentation layer.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QuestionView {
    pub id: QuestionId,
    pub question_text: String,
    pub all_answers: Vec<String>,
    pub correct_answer: String,
    pub selected: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
}

impl From<&QuestionRecord> for QuestionView {
    fn from(record: &QuestionRecord) -> Self {
        Self {
            id: record.id(),
            question_text: record.question_text().to_string(),
            all_answers: record.all_answers().to_vec(),
            correct_answer: record.correct_answer().to_string(),
            selected: record.selected().map(str::to_string),
            category: record.category().map(str::to_string),
            difficulty: record.difficulty().map(str::to_string),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SessionView {
    pub generation: u64,
    pub phase: QuizPhase,
    pub questions: Vec<QuestionView>,
    pub warning: bool,
    /// Set only in `Results`.
    pub score: Option<u32>,
    /// Set only in `Error`.
    pub error: Option<String>,
    pub display_results: bool,
}

/// In-memory state of one quiz attempt.
///
/// `generation` identifies the fetch chain the session is waiting on. It only
/// ever grows, so a completion carrying an older generation belongs to a
/// discarded attempt.
#[derive(Debug, Clone)]
pub struct QuizSession {
    generation: u64,
    questions: Vec<QuestionRecord>,
    phase: QuizPhase,
    warning: bool,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizSession {
    pub fn new() -> Self {
        Self {
            generation: 0,
            questions: Vec::new(),
            phase: QuizPhase::Loading,
            warning: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> &QuizPhase {
        &self.phase
    }

    pub fn questions(&self) -> &[QuestionRecord] {
        &self.questions
    }

    pub fn warning(&self) -> bool {
        self.warning
    }

    pub fn score(&self) -> Option<u32> {
        match self.phase {
            QuizPhase::Results { score } => Some(score),
            _ => None,
        }
    }

    /// Discards everything and waits for a new fetch. Returns the generation
    /// the new fetch must be tagged with.
    pub fn restart(&mut self) -> u64 {
        *self = Self {
            generation: self.generation + 1,
            ..Self::new()
        };
        self.generation
    }

    /// Applies the outcome of the fetch chain tagged `generation`. Returns
    /// `false` when the completion is stale and was dropped.
    pub fn apply_fetch_result(
        &mut self,
        generation: u64,
        result: FetchResult<Vec<QuestionRecord>>,
    ) -> bool {
        if generation != self.generation || self.phase != QuizPhase::Loading {
            tracing::debug!(
                session.generation = self.generation,
                fetch.generation = generation,
                "Dropping stale fetch completion"
            );
            return false;
        }

        match result {
            Ok(questions) => {
                tracing::info!(
                    session.generation = generation,
                    questions.count = questions.len(),
                    "Quiz ready for answers"
                );
                self.questions = questions;
                self.warning = false;
                self.phase = QuizPhase::Answering;
            }
            Err(e) => {
                tracing::error!(
                    session.generation = generation,
                    error = %e,
                    "Quiz fetch failed"
                );
                self.questions.clear();
                self.phase = QuizPhase::Error {
                    message: e.to_string(),
                };
            }
        }
        true
    }

    /// Records `answer` for question `id`. Ignored outside `Answering`, for
    /// unknown ids and for answers that are not among the question's choices.
    pub fn select_answer(&mut self, id: QuestionId, answer: &str) -> bool {
        if self.phase != QuizPhase::Answering {
            tracing::debug!(question.id = %id, phase = ?self.phase, "Selection ignored outside answering phase");
            return false;
        }

        let Some(record) = self.questions.iter_mut().find(|q| q.id() == id) else {
            tracing::debug!(question.id = %id, "Selection for unknown question ignored");
            return false;
        };

        if !record.all_answers().iter().any(|a| a == answer) {
            tracing::debug!(question.id = %id, answer = %answer, "Selection is not one of the choices");
            return false;
        }

        record.select(answer);
        tracing::debug!(question.id = %id, answer = %answer, "Answer selected");
        true
    }

    /// Checks the quiz. Scores only when every question has a selection;
    /// otherwise raises the warning flag and stays in `Answering`.
    pub fn submit(&mut self) -> SubmitOutcome {
        match self.phase {
            QuizPhase::Answering | QuizPhase::Results { .. } => {}
            _ => return SubmitOutcome::NotReady,
        }

        let unanswered = self.questions.iter().filter(|q| !q.is_answered()).count();
        if unanswered > 0 {
            tracing::warn!(questions.unanswered = unanswered, "Submission with unanswered questions");
            self.warning = true;
            return SubmitOutcome::Incomplete { unanswered };
        }

        let score = self.questions.iter().filter(|q| q.is_correct()).count() as u32;
        self.warning = false;
        self.phase = QuizPhase::Results { score };
        tracing::info!(
            quiz.score = score,
            quiz.total = self.questions.len(),
            "Quiz checked"
        );
        SubmitOutcome::Scored {
            score,
            total: self.questions.len(),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            QuizPhase::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            generation: self.generation(),
            phase: self.phase().clone(),
            questions: self.questions().iter().map(QuestionView::from).collect(),
            warning: self.warning(),
            score: self.score(),
            error: self.error().map(str::to_string),
            display_results: self.score().is_some(),
        }
    }
}
