pub mod api;
pub mod error;
pub mod question;
pub mod retry;

pub use api::{HttpTransport, TriviaTransport};
pub use error::FetchError;
pub use question::{QuestionId, QuestionRecord};
pub use retry::RetryPolicy;
