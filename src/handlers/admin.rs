// src/handlers/admin.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    funnel::analytics::funnel_report,
    handlers::player::load_quiz,
    models::quiz::PublishQuizRequest,
    store::SharedStore,
    utils::jwt::Claims,
};

/// Lists all published quizzes.
/// Admin only.
pub async fn list_quizzes(State(store): State<SharedStore>) -> Result<impl IntoResponse, AppError> {
    let quizzes = store.list_quizzes().await?;
    Ok(Json(quizzes))
}

/// Publishes a quiz definition, replacing any earlier version with the same slug.
/// Admin only.
///
/// Existing sessions keep their answers and are reconciled with the new
/// definition the next time they are loaded.
pub async fn publish_quiz(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PublishQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let quiz = store.publish_quiz(payload.into_new_quiz()).await?;
    tracing::info!(
        "Quiz '{}' published by {} ({} slides)",
        quiz.slug,
        claims.sub,
        quiz.slides.len()
    );

    Ok(Json(quiz))
}

/// Funnel analytics: completion, reach, drop-off and answer distribution.
/// Admin only.
pub async fn get_analytics(
    State(store): State<SharedStore>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_quiz(store.as_ref(), &slug).await?;
    let responses = store.list_responses(quiz.id).await?;

    Ok(Json(funnel_report(&quiz, &responses)))
}

/// Raw responses for export.
/// Admin only.
pub async fn list_responses(
    State(store): State<SharedStore>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_quiz(store.as_ref(), &slug).await?;
    let responses = store.list_responses(quiz.id).await?;

    Ok(Json(responses))
}
