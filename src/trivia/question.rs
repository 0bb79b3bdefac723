use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::api::RawQuestion;

/// Opaque per-question identifier. Only uniqueness within a session matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionId(Uuid);

impl QuestionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QuestionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One trivia question with its answer order frozen at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    id: QuestionId,
    question_text: String,
    correct_answer: String,
    all_answers: Vec<String>,
    selected: Option<String>,
    category: Option<String>,
    difficulty: Option<String>,
}

impl QuestionRecord {
    /// Decodes every text field and shuffles the correct answer in among the
    /// incorrect ones. The resulting order never changes afterwards.
    pub fn from_raw<R: Rng + ?Sized>(raw: RawQuestion, rng: &mut R) -> Self {
        let correct_answer = decode(&raw.correct_answer);
        let mut all_answers: Vec<String> = raw
            .incorrect_answers
            .iter()
            .map(|answer| decode(answer))
            .collect();
        all_answers.push(correct_answer.clone());
        all_answers.shuffle(rng);

        Self {
            id: QuestionId::new(),
            question_text: decode(&raw.question),
            correct_answer,
            all_answers,
            selected: None,
            category: raw.category.as_deref().map(decode),
            difficulty: raw.difficulty,
        }
    }

    pub fn id(&self) -> QuestionId {
        self.id
    }

    pub fn question_text(&self) -> &str {
        &self.question_text
    }

    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    pub fn all_answers(&self) -> &[String] {
        &self.all_answers
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref()
    }

    pub fn is_answered(&self) -> bool {
        self.selected.is_some()
    }

    pub fn is_correct(&self) -> bool {
        self.selected.as_deref() == Some(self.correct_answer.as_str())
    }

    /// Overwrites the current selection. There is no way to clear it.
    pub(crate) fn select(&mut self, answer: &str) {
        self.selected = Some(answer.to_string());
    }
}

fn decode(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn raw(question: &str, correct: &str, incorrect: &[&str]) -> RawQuestion {
        RawQuestion {
            category: Some("Science &amp; Nature".to_string()),
            difficulty: Some("easy".to_string()),
            question: question.to_string(),
            correct_answer: correct.to_string(),
            incorrect_answers: incorrect.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn decodes_entities_in_all_text_fields() {
        let mut rng = StdRng::seed_from_u64(7);
        let record = QuestionRecord::from_raw(
            raw(
                "Which of these is &quot;Rust&#039;s&quot; mascot?",
                "Ferris &amp; friends",
                &["Gopher", "Duke &lt;3"],
            ),
            &mut rng,
        );

        assert_eq!(
            record.question_text(),
            "Which of these is \"Rust's\" mascot?"
        );
        assert_eq!(record.correct_answer(), "Ferris & friends");
        assert!(record.all_answers().contains(&"Duke <3".to_string()));
        assert_eq!(record.category(), Some("Science & Nature"));
        assert_eq!(record.difficulty(), Some("easy"));
        assert!(!record.is_answered());
    }

    #[test]
    fn answers_are_a_permutation_with_one_correct_entry() {
        let mut rng = StdRng::seed_from_u64(42);
        let record = QuestionRecord::from_raw(raw("Q", "A", &["B", "C", "D"]), &mut rng);

        let mut sorted = record.all_answers().to_vec();
        sorted.sort();
        assert_eq!(sorted, vec!["A", "B", "C", "D"]);
        assert_eq!(
            record
                .all_answers()
                .iter()
                .filter(|a| a.as_str() == record.correct_answer())
                .count(),
            1
        );
    }

    #[test]
    fn every_permutation_is_reachable() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let record = QuestionRecord::from_raw(raw("Q", "A", &["B", "C"]), &mut rng);
            seen.insert(record.all_answers().to_vec());
        }
        // 3! orderings of three answers
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn boolean_question_keeps_both_answers() {
        let mut rng = StdRng::seed_from_u64(3);
        let record = QuestionRecord::from_raw(raw("Is water wet?", "True", &["False"]), &mut rng);
        assert_eq!(record.all_answers().len(), 2);
    }

    #[test]
    fn selection_overwrites_and_scores() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut record = QuestionRecord::from_raw(raw("Q", "A", &["B"]), &mut rng);
        let order_before = record.all_answers().to_vec();

        record.select("B");
        assert!(record.is_answered());
        assert!(!record.is_correct());

        record.select("A");
        assert_eq!(record.selected(), Some("A"));
        assert!(record.is_correct());
        assert_eq!(record.all_answers(), order_before.as_slice());
    }

    #[test]
    fn ids_are_unique() {
        let mut rng = StdRng::seed_from_u64(11);
        let ids: HashSet<QuestionId> = (0..50)
            .map(|_| QuestionRecord::from_raw(raw("Q", "A", &["B"]), &mut rng).id())
            .collect();
        assert_eq!(ids.len(), 50);
    }
}
