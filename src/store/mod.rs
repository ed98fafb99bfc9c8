// src/store/mod.rs

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        quiz::{NewQuiz, Quiz, QuizSummary},
        response::QuizResponse,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence for quiz definitions and session responses.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a quiz, or replaces the definition of the quiz with the same slug.
    async fn publish_quiz(&self, quiz: NewQuiz) -> Result<Quiz, AppError>;

    async fn quiz_by_slug(&self, slug: &str) -> Result<Option<Quiz>, AppError>;

    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, AppError>;

    async fn find_response(
        &self,
        quiz_id: i64,
        session_id: &str,
    ) -> Result<Option<QuizResponse>, AppError>;

    /// Upserts on (quiz_id, session_id). A stored completion time is never cleared.
    async fn save_response(&self, response: &QuizResponse) -> Result<(), AppError>;

    /// Writes a transition made on a previously loaded response.
    ///
    /// Succeeds only if the stored revision still equals `response.revision`,
    /// otherwise returns `AppError::Conflict` and leaves the record untouched.
    async fn update_response(&self, response: &QuizResponse) -> Result<(), AppError>;

    async fn list_responses(&self, quiz_id: i64) -> Result<Vec<QuizResponse>, AppError>;
}

pub type SharedStore = Arc<dyn Store>;

pub(crate) fn concurrent_update(session_id: &str) -> AppError {
    tracing::warn!("Rejected concurrent update of session {}", session_id);
    AppError::Conflict("Session was updated concurrently, reload and retry".to_string())
}
