// src/handlers/player.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    funnel::session,
    models::{
        quiz::Quiz,
        response::{AdvanceRequest, AnswerRequest, QuizResponse},
    },
    store::{SharedStore, Store},
    utils::session_id::validate_session_id,
};

pub(crate) async fn load_quiz(store: &dyn Store, slug: &str) -> Result<Quiz, AppError> {
    store
        .quiz_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz '{}' not found", slug)))
}

/// Loads an existing session and reconciles it with the current quiz definition.
async fn load_session(
    store: &dyn Store,
    slug: &str,
    session_id: &str,
) -> Result<(Quiz, QuizResponse), AppError> {
    validate_session_id(session_id)?;
    let quiz = load_quiz(store, slug).await?;

    let mut response = store
        .find_response(quiz.id, session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Session not started".to_string()))?;

    if session::resume(&quiz, &mut response, Utc::now()) {
        tracing::info!(
            "Session {} repositioned after quiz '{}' changed",
            session_id,
            slug
        );
    }

    Ok((quiz, response))
}

/// Returns the quiz definition for the player.
pub async fn get_quiz(
    State(store): State<SharedStore>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_quiz(store.as_ref(), &slug).await?;
    Ok(Json(quiz))
}

/// Starts a session, or resumes it if the session id is already known.
///
/// Returns 201 for a new session and 200 for a resumed one.
pub async fn start_session(
    State(store): State<SharedStore>,
    Path((slug, session_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    validate_session_id(&session_id)?;
    let quiz = load_quiz(store.as_ref(), &slug).await?;
    let now = Utc::now();

    let (response, status) = match store.find_response(quiz.id, &session_id).await? {
        Some(mut existing) => {
            if session::resume(&quiz, &mut existing, now) {
                store.update_response(&existing).await?;
            }
            (existing, StatusCode::OK)
        }
        None => {
            let created = session::start(&quiz, &session_id, now)
                .ok_or_else(|| AppError::BadRequest(format!("Quiz '{}' has no slides", slug)))?;
            store.save_response(&created).await?;
            tracing::info!("Session {} started quiz '{}'", session_id, slug);
            (created, StatusCode::CREATED)
        }
    };

    Ok((status, Json(session::snapshot(&quiz, &response)?)))
}

/// Returns the current player state without changing it.
pub async fn get_session(
    State(store): State<SharedStore>,
    Path((slug, session_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let (quiz, response) = load_session(store.as_ref(), &slug, &session_id).await?;
    Ok(Json(session::snapshot(&quiz, &response)?))
}

/// Records an answer on the current slide and moves on.
pub async fn answer(
    State(store): State<SharedStore>,
    Path((slug, session_id)): Path<(String, String)>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let (quiz, mut response) = load_session(store.as_ref(), &slug, &session_id).await?;
    let was_completed = response.is_completed();

    session::answer(
        &quiz,
        &mut response,
        &payload.slide_id,
        payload.option_ids,
        Utc::now(),
    )?;
    store.update_response(&response).await?;

    if !was_completed && response.is_completed() {
        tracing::info!("Session {} completed quiz '{}'", session_id, slug);
    }

    Ok(Json(session::snapshot(&quiz, &response)?))
}

/// Moves past the current (non-choice or already answered) slide.
pub async fn advance(
    State(store): State<SharedStore>,
    Path((slug, session_id)): Path<(String, String)>,
    Json(payload): Json<AdvanceRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let (quiz, mut response) = load_session(store.as_ref(), &slug, &session_id).await?;
    let was_completed = response.is_completed();

    session::advance(&quiz, &mut response, &payload.slide_id, Utc::now())?;
    store.update_response(&response).await?;

    if !was_completed && response.is_completed() {
        tracing::info!("Session {} completed quiz '{}'", session_id, slug);
    }

    Ok(Json(session::snapshot(&quiz, &response)?))
}

/// Goes back one visible slide.
pub async fn back(
    State(store): State<SharedStore>,
    Path((slug, session_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let (quiz, mut response) = load_session(store.as_ref(), &slug, &session_id).await?;

    session::back(&quiz, &mut response, Utc::now())?;
    store.update_response(&response).await?;

    Ok(Json(session::snapshot(&quiz, &response)?))
}
