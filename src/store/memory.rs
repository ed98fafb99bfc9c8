// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{Store, concurrent_update};
use crate::{
    error::AppError,
    models::{
        quiz::{NewQuiz, Quiz, QuizSummary},
        response::QuizResponse,
    },
};

#[derive(Default)]
struct Inner {
    next_quiz_id: i64,
    /// Keyed by slug.
    quizzes: HashMap<String, Quiz>,
    responses: HashMap<(i64, String), QuizResponse>,
}

/// Process-local store. Used when no database is configured, and by tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn publish_quiz(&self, quiz: NewQuiz) -> Result<Quiz, AppError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        if let Some(existing) = inner.quizzes.get_mut(&quiz.slug) {
            existing.name = quiz.name;
            existing.settings = quiz.settings;
            existing.slides = quiz.slides;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        inner.next_quiz_id += 1;
        let stored = Quiz {
            id: inner.next_quiz_id,
            slug: quiz.slug,
            name: quiz.name,
            settings: quiz.settings,
            slides: quiz.slides,
            created_at: now,
            updated_at: now,
        };
        inner.quizzes.insert(stored.slug.clone(), stored.clone());

        Ok(stored)
    }

    async fn quiz_by_slug(&self, slug: &str) -> Result<Option<Quiz>, AppError> {
        Ok(self.inner.read().await.quizzes.get(slug).cloned())
    }

    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, AppError> {
        let inner = self.inner.read().await;
        let mut quizzes: Vec<QuizSummary> = inner
            .quizzes
            .values()
            .map(|q| QuizSummary {
                id: q.id,
                slug: q.slug.clone(),
                name: q.name.clone(),
                slide_count: q.slides.len() as i64,
                updated_at: q.updated_at,
            })
            .collect();
        quizzes.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(quizzes)
    }

    async fn find_response(
        &self,
        quiz_id: i64,
        session_id: &str,
    ) -> Result<Option<QuizResponse>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .responses
            .get(&(quiz_id, session_id.to_string()))
            .cloned())
    }

    async fn save_response(&self, response: &QuizResponse) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let key = (response.quiz_id, response.session_id.clone());

        let mut stored = response.clone();
        if let Some(previous) = inner.responses.get(&key) {
            stored.completed_at = previous.completed_at.or(stored.completed_at);
            stored.revision = previous.revision + 1;
        }
        inner.responses.insert(key, stored);

        Ok(())
    }

    async fn update_response(&self, response: &QuizResponse) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let key = (response.quiz_id, response.session_id.clone());

        let previous = inner
            .responses
            .get_mut(&key)
            .ok_or_else(|| AppError::NotFound("Session not started".to_string()))?;
        if previous.revision != response.revision {
            return Err(concurrent_update(&response.session_id));
        }

        let completed_at = previous.completed_at.or(response.completed_at);
        *previous = QuizResponse {
            completed_at,
            revision: response.revision + 1,
            ..response.clone()
        };

        Ok(())
    }

    async fn list_responses(&self, quiz_id: i64) -> Result<Vec<QuizResponse>, AppError> {
        let inner = self.inner.read().await;
        let mut responses: Vec<QuizResponse> = inner
            .responses
            .values()
            .filter(|r| r.quiz_id == quiz_id)
            .cloned()
            .collect();
        responses.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(responses)
    }
}
