// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};

use super::{Store, concurrent_update};
use crate::{
    error::AppError,
    models::{
        quiz::{NewQuiz, Quiz, QuizSettings, QuizSummary, Slide},
        response::{Answer, QuizResponse},
    },
};

/// Represents the 'quizzes' table in the database.
#[derive(FromRow)]
struct QuizRow {
    id: i64,
    slug: String,
    name: String,
    settings: Json<QuizSettings>,
    slides: Json<Vec<Slide>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<QuizRow> for Quiz {
    fn from(row: QuizRow) -> Self {
        Quiz {
            id: row.id,
            slug: row.slug,
            name: row.name,
            settings: row.settings.0,
            slides: row.slides.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct QuizSummaryRow {
    id: i64,
    slug: String,
    name: String,
    slide_count: i64,
    updated_at: DateTime<Utc>,
}

/// Represents the 'quiz_responses' table in the database.
#[derive(FromRow)]
struct ResponseRow {
    quiz_id: i64,
    session_id: String,
    answers: Json<Vec<Answer>>,
    current_slide_id: String,
    reached_slide_ids: Json<Vec<String>>,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    revision: i64,
}

impl From<ResponseRow> for QuizResponse {
    fn from(row: ResponseRow) -> Self {
        QuizResponse {
            quiz_id: row.quiz_id,
            session_id: row.session_id,
            answers: row.answers.0,
            current_slide_id: row.current_slide_id,
            reached_slide_ids: row.reached_slide_ids.0,
            started_at: row.started_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
            revision: row.revision,
        }
    }
}

const RESPONSE_COLUMNS: &str = "quiz_id, session_id, answers, current_slide_id, \
     reached_slide_ids, started_at, updated_at, completed_at, revision";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations in `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn publish_quiz(&self, quiz: NewQuiz) -> Result<Quiz, AppError> {
        let row = sqlx::query_as::<_, QuizRow>(
            r#"
            INSERT INTO quizzes (slug, name, settings, slides)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO UPDATE SET
                name = EXCLUDED.name,
                settings = EXCLUDED.settings,
                slides = EXCLUDED.slides,
                updated_at = NOW()
            RETURNING id, slug, name, settings, slides, created_at, updated_at
            "#,
        )
        .bind(&quiz.slug)
        .bind(&quiz.name)
        .bind(Json(&quiz.settings))
        .bind(Json(&quiz.slides))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to publish quiz '{}': {:?}", quiz.slug, e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(row.into())
    }

    async fn quiz_by_slug(&self, slug: &str) -> Result<Option<Quiz>, AppError> {
        let row = sqlx::query_as::<_, QuizRow>(
            r#"
            SELECT id, slug, name, settings, slides, created_at, updated_at
            FROM quizzes
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Quiz::from))
    }

    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, AppError> {
        let rows = sqlx::query_as::<_, QuizSummaryRow>(
            r#"
            SELECT
                id, slug, name,
                jsonb_array_length(slides)::BIGINT AS slide_count,
                updated_at
            FROM quizzes
            ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| QuizSummary {
                id: r.id,
                slug: r.slug,
                name: r.name,
                slide_count: r.slide_count,
                updated_at: r.updated_at,
            })
            .collect())
    }

    async fn find_response(
        &self,
        quiz_id: i64,
        session_id: &str,
    ) -> Result<Option<QuizResponse>, AppError> {
        let row = sqlx::query_as::<_, ResponseRow>(&format!(
            "SELECT {} FROM quiz_responses WHERE quiz_id = $1 AND session_id = $2",
            RESPONSE_COLUMNS
        ))
        .bind(quiz_id)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(QuizResponse::from))
    }

    async fn save_response(&self, response: &QuizResponse) -> Result<(), AppError> {
        // Upsert: a completion time, once written, is never cleared.
        sqlx::query(
            r#"
            INSERT INTO quiz_responses
                (quiz_id, session_id, answers, current_slide_id, reached_slide_ids,
                 started_at, updated_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (quiz_id, session_id) DO UPDATE SET
                answers = EXCLUDED.answers,
                current_slide_id = EXCLUDED.current_slide_id,
                reached_slide_ids = EXCLUDED.reached_slide_ids,
                updated_at = EXCLUDED.updated_at,
                completed_at = COALESCE(quiz_responses.completed_at, EXCLUDED.completed_at),
                revision = quiz_responses.revision + 1
            "#,
        )
        .bind(response.quiz_id)
        .bind(&response.session_id)
        .bind(Json(&response.answers))
        .bind(&response.current_slide_id)
        .bind(Json(&response.reached_slide_ids))
        .bind(response.started_at)
        .bind(response.updated_at)
        .bind(response.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(
                "Failed to save response for session '{}': {:?}",
                response.session_id,
                e
            );
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(())
    }

    async fn update_response(&self, response: &QuizResponse) -> Result<(), AppError> {
        // Compare-and-swap on revision: of two racing transitions only one lands.
        let result = sqlx::query(
            r#"
            UPDATE quiz_responses SET
                answers = $3,
                current_slide_id = $4,
                reached_slide_ids = $5,
                updated_at = $6,
                completed_at = COALESCE(completed_at, $7),
                revision = revision + 1
            WHERE quiz_id = $1 AND session_id = $2 AND revision = $8
            "#,
        )
        .bind(response.quiz_id)
        .bind(&response.session_id)
        .bind(Json(&response.answers))
        .bind(&response.current_slide_id)
        .bind(Json(&response.reached_slide_ids))
        .bind(response.updated_at)
        .bind(response.completed_at)
        .bind(response.revision)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(
                "Failed to update response for session '{}': {:?}",
                response.session_id,
                e
            );
            AppError::InternalServerError(e.to_string())
        })?;

        if result.rows_affected() == 0 {
            return Err(concurrent_update(&response.session_id));
        }

        Ok(())
    }

    async fn list_responses(&self, quiz_id: i64) -> Result<Vec<QuizResponse>, AppError> {
        let rows = sqlx::query_as::<_, ResponseRow>(&format!(
            "SELECT {} FROM quiz_responses WHERE quiz_id = $1 ORDER BY started_at ASC",
            RESPONSE_COLUMNS
        ))
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(QuizResponse::from).collect())
    }
}
