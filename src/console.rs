// src/console.rs
//
// Line-oriented terminal front end. It only ever reads `SessionView`
// snapshots and sends commands back through the controller handle.

use std::fmt::Write as _;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use crate::error::{AppError, Result as AppResult};
use crate::quiz::{QuizPhase, SessionControllerHandle, SessionView, SubmitOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// 1-based question and answer numbers, as printed on screen.
    Select { question: usize, answer: usize },
    Check,
    PlayAgain,
    Quit,
    Unknown(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let command = match trimmed.to_lowercase().as_str() {
            "c" | "check" => Self::Check,
            "p" | "play" => Self::PlayAgain,
            "q" | "quit" | "exit" => Self::Quit,
            other => {
                let mut parts = other.split_whitespace();
                match (
                    parts.next().and_then(|p| p.parse::<usize>().ok()),
                    parts.next().and_then(|p| p.parse::<usize>().ok()),
                    parts.next(),
                ) {
                    (Some(question), Some(answer), None) if question > 0 && answer > 0 => {
                        Self::Select { question, answer }
                    }
                    _ => Self::Unknown(trimmed.to_string()),
                }
            }
        };
        Some(command)
    }
}

pub fn render(view: &SessionView) -> String {
    let mut out = String::new();

    match &view.phase {
        QuizPhase::Loading => {
            let _ = writeln!(out, "Loading questions...");
            return out;
        }
        QuizPhase::Error { message } => {
            let _ = writeln!(out, "{}", message);
            let _ = writeln!(out, "Type 'play' to try again or 'quit' to leave.");
            return out;
        }
        QuizPhase::Answering | QuizPhase::Results { .. } => {}
    }

    for (q_index, question) in view.questions.iter().enumerate() {
        let _ = write!(out, "\n{}. {}", q_index + 1, question.question_text);
        if let Some(category) = &question.category {
            let _ = write!(out, "  [{}]", category);
        }
        let _ = writeln!(out);

        for (a_index, answer) in question.all_answers.iter().enumerate() {
            let is_selected = question.selected.as_deref() == Some(answer.as_str());
            let marker = if view.display_results {
                if *answer == question.correct_answer {
                    "[+]"
                } else if is_selected {
                    "[x]"
                } else {
                    "[ ]"
                }
            } else if is_selected {
                "(*)"
            } else {
                "( )"
            };
            let _ = writeln!(out, "   {} {}) {}", marker, a_index + 1, answer);
        }
    }
    let _ = writeln!(out);

    if view.warning {
        let _ = writeln!(out, "Please select an answer for each question");
    }

    match view.score {
        Some(score) => {
            let _ = writeln!(
                out,
                "You scored {}/{} correct answers",
                score,
                view.questions.len()
            );
            let _ = writeln!(out, "Type 'play' to play again or 'quit' to leave.");
        }
        None => {
            let _ = writeln!(
                out,
                "Pick with '<question> <answer>', then type 'check' to check answers."
            );
        }
    }
    out
}

async fn print(text: &str) -> AppResult<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

async fn dispatch(
    handle: &SessionControllerHandle,
    view: &SessionView,
    command: ConsoleCommand,
) -> AppResult<bool> {
    match command {
        ConsoleCommand::Select { question, answer } => {
            let choice = view.questions.get(question - 1).and_then(|q| {
                q.all_answers
                    .get(answer - 1)
                    .map(|a| (q.id, a.clone()))
            });
            match choice {
                Some((id, text)) => {
                    let applied = handle
                        .select_answer(id, text)
                        .await
                        .map_err(AppError::Controller)?;
                    if !applied {
                        print("That selection can't be changed right now.\n").await?;
                    }
                }
                None => print("No such question or answer.\n").await?,
            }
        }
        ConsoleCommand::Check => {
            let outcome = handle.submit().await.map_err(AppError::Controller)?;
            match outcome {
                SubmitOutcome::Scored { score, total } => {
                    tracing::debug!(quiz.score = score, quiz.total = total, "Answers checked");
                }
                SubmitOutcome::Incomplete { unanswered } => {
                    tracing::debug!(questions.unanswered = unanswered, "Check refused");
                }
                SubmitOutcome::NotReady => print("Nothing to check yet.\n").await?,
            }
        }
        ConsoleCommand::PlayAgain => {
            handle.restart().await.map_err(AppError::Controller)?;
        }
        ConsoleCommand::Quit => return Ok(false),
        ConsoleCommand::Unknown(input) => {
            print(&format!("Unrecognised command: {}\n", input)).await?;
        }
    }
    Ok(true)
}

/// Owns stdin for the lifetime of the program so no buffered input is lost
/// between the start screen and the quiz loop.
pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Waits for Enter on the start screen. Returns `false` if stdin closed.
    pub async fn start_screen(&mut self) -> AppResult<bool> {
        print("\n  Quizzical\n  Let's test your knowledge!\n\n  Press Enter to start quiz\n")
            .await?;
        Ok(self.lines.next_line().await?.is_some())
    }

    /// Renders every snapshot and forwards commands until the user quits or
    /// stdin closes.
    pub async fn run(&mut self, handle: SessionControllerHandle) -> AppResult<()> {
        let mut views = handle.subscribe();

        let initial = views.borrow_and_update().clone();
        print(&render(&initial)).await?;

        loop {
            tokio::select! {
                changed = views.changed() => {
                    if changed.is_err() {
                        tracing::warn!("Session controller stopped publishing");
                        break;
                    }
                    let view = views.borrow_and_update().clone();
                    print(&render(&view)).await?;
                }
                line = self.lines.next_line() => {
                    let Some(line) = line? else { break };
                    let Some(command) = ConsoleCommand::parse(&line) else { continue };
                    let view = handle.snapshot().await.map_err(AppError::Controller)?;
                    if !dispatch(&handle, &view, command).await? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
