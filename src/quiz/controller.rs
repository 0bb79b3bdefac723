use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::session::{QuizSession, SessionView, SubmitOutcome};
use crate::trivia::error::Result as FetchResult;
use crate::trivia::{QuestionId, QuestionRecord, RetryPolicy, TriviaTransport};

#[derive(Debug)]
pub enum SessionMessage {
    SelectAnswer {
        question_id: QuestionId,
        answer: String,
        respond_to: oneshot::Sender<bool>,
    },
    Submit {
        respond_to: oneshot::Sender<SubmitOutcome>,
    },
    Restart {
        respond_to: oneshot::Sender<u64>,
    },
    GetSnapshot {
        respond_to: oneshot::Sender<SessionView>,
    },
}

struct FetchCompletion {
    generation: u64,
    result: FetchResult<Vec<QuestionRecord>>,
}

struct SessionActor<T: TriviaTransport + 'static> {
    receiver: mpsc::Receiver<SessionMessage>,
    completion_tx: mpsc::Sender<FetchCompletion>,
    completion_rx: mpsc::Receiver<FetchCompletion>,
    view_tx: watch::Sender<SessionView>,
    session: QuizSession,
    transport: Arc<T>,
    policy: RetryPolicy,
    amount: u8,
    fetch_task: Option<JoinHandle<()>>,
}

impl<T: TriviaTransport + 'static> SessionActor<T> {
    /// Starts the fetch chain for the session's current generation. A chain
    /// still running for an older generation is aborted first.
    fn start_fetch(&mut self) {
        if let Some(previous) = self.fetch_task.take() {
            previous.abort();
        }

        let generation = self.session.generation();
        let transport = Arc::clone(&self.transport);
        let policy = self.policy;
        let amount = self.amount;
        let completion_tx = self.completion_tx.clone();

        tracing::info!(session.generation = generation, "Starting question fetch");
        self.fetch_task = Some(tokio::spawn(async move {
            let result = policy.fetch_questions(transport.as_ref(), amount).await;
            if completion_tx
                .send(FetchCompletion { generation, result })
                .await
                .is_err()
            {
                tracing::debug!(
                    session.generation = generation,
                    "Session actor gone before fetch completed"
                );
            }
        }));
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.session.view());
    }

    fn handle_completion(&mut self, completion: FetchCompletion) {
        if self
            .session
            .apply_fetch_result(completion.generation, completion.result)
        {
            self.fetch_task = None;
            self.publish();
        }
    }

    #[tracing::instrument(skip(self, msg), fields(session.generation = self.session.generation()))]
    fn handle_message(&mut self, msg: SessionMessage) {
        match msg {
            SessionMessage::SelectAnswer {
                question_id,
                answer,
                respond_to,
            } => {
                let applied = self.session.select_answer(question_id, &answer);
                if applied {
                    self.publish();
                }
                let _ = respond_to.send(applied);
            }
            SessionMessage::Submit { respond_to } => {
                let outcome = self.session.submit();
                if outcome != SubmitOutcome::NotReady {
                    self.publish();
                }
                let _ = respond_to.send(outcome);
            }
            SessionMessage::Restart { respond_to } => {
                let generation = self.session.restart();
                tracing::info!(session.generation = generation, "Quiz restarted");
                self.start_fetch();
                self.publish();
                let _ = respond_to.send(generation);
            }
            SessionMessage::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.session.view());
            }
        }
    }
}

async fn run_session_actor<T: TriviaTransport + 'static>(mut actor: SessionActor<T>) {
    tracing::info!("Session controller started");
    actor.start_fetch();

    loop {
        tokio::select! {
            maybe_msg = actor.receiver.recv() => {
                match maybe_msg {
                    Some(msg) => actor.handle_message(msg),
                    None => break,
                }
            }
            Some(completion) = actor.completion_rx.recv() => {
                actor.handle_completion(completion);
            }
        }
    }

    if let Some(task) = actor.fetch_task.take() {
        task.abort();
    }
    tracing::info!("Session controller shut down");
}

/// Cloneable front door to the session actor. All mutations go through here
/// and every accepted one is followed by a fresh snapshot on the watch channel.
#[derive(Clone, Debug)]
pub struct SessionControllerHandle {
    sender: mpsc::Sender<SessionMessage>,
    view_rx: watch::Receiver<SessionView>,
}

impl SessionControllerHandle {
    /// Spawns the actor, which immediately begins the first fetch.
    pub fn spawn<T: TriviaTransport + 'static>(
        transport: Arc<T>,
        policy: RetryPolicy,
        amount: u8,
        buffer_size: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let (completion_tx, completion_rx) = mpsc::channel(1);
        let session = QuizSession::new();
        let (view_tx, view_rx) = watch::channel(session.view());

        let actor = SessionActor {
            receiver,
            completion_tx,
            completion_rx,
            view_tx,
            session,
            transport,
            policy,
            amount,
            fetch_task: None,
        };
        tokio::spawn(run_session_actor(actor));

        Self { sender, view_rx }
    }

    /// Receiver that yields a new `SessionView` after every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_rx.clone()
    }

    pub async fn select_answer(
        &self,
        question_id: QuestionId,
        answer: impl Into<String>,
    ) -> Result<bool, String> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::SelectAnswer {
                question_id,
                answer: answer.into(),
                respond_to,
            })
            .await
            .map_err(|e| format!("Failed to send SelectAnswer: {}", e))?;
        rx.await
            .map_err(|e| format!("Session controller no response: {}", e))
    }

    pub async fn submit(&self) -> Result<SubmitOutcome, String> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::Submit { respond_to })
            .await
            .map_err(|e| format!("Failed to send Submit: {}", e))?;
        rx.await
            .map_err(|e| format!("Session controller no response: {}", e))
    }

    /// Throws the current attempt away and fetches a new one. Returns the
    /// generation of the new attempt.
    pub async fn restart(&self) -> Result<u64, String> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::Restart { respond_to })
            .await
            .map_err(|e| format!("Failed to send Restart: {}", e))?;
        rx.await
            .map_err(|e| format!("Session controller no response: {}", e))
    }

    pub async fn snapshot(&self) -> Result<SessionView, String> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::GetSnapshot { respond_to })
            .await
            .map_err(|e| format!("Failed to send GetSnapshot: {}", e))?;
        rx.await
            .map_err(|e| format!("Session controller no response: {}", e))
    }
}
