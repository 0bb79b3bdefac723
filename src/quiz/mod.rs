pub mod controller;
pub mod session;

pub use controller::SessionControllerHandle;
pub use session::{QuizPhase, SessionView, SubmitOutcome};
