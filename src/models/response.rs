// src/models/response.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::quiz::Slide;

/// Options selected on one choice slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub slide_id: String,
    pub option_ids: Vec<String>,
    pub answered_at: DateTime<Utc>,
}

/// A respondent's progress through one quiz.
/// Unique per (quiz_id, session_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub quiz_id: i64,
    pub session_id: String,
    pub answers: Vec<Answer>,
    pub current_slide_id: String,

    /// Slides shown to the respondent, in first-visit order.
    pub reached_slide_ids: Vec<String>,

    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Bumped by the store on every write; stale copies fail to update.
    #[serde(default)]
    pub revision: i64,
}

impl QuizResponse {
    pub fn answer_for(&self, slide_id: &str) -> Option<&Answer> {
        self.answers.iter().find(|a| a.slide_id == slide_id)
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// DTO for answering the current slide.
#[derive(Debug, Deserialize, Validate)]
pub struct AnswerRequest {
    #[validate(length(min = 1, max = 64))]
    pub slide_id: String,

    #[validate(length(min = 1, max = 50))]
    pub option_ids: Vec<String>,
}

/// DTO for moving past the current slide.
/// Carries the slide the client believes is current, so repeated clicks are detected.
#[derive(Debug, Deserialize, Validate)]
pub struct AdvanceRequest {
    #[validate(length(min = 1, max = 64))]
    pub slide_id: String,
}

/// What the player needs to render the current screen.
#[derive(Debug, Serialize)]
pub struct PlayerState {
    pub session_id: String,
    pub quiz_slug: String,
    pub current_slide: Slide,

    /// 1-based position among the slides visible to this respondent.
    pub position: usize,
    pub total: usize,
    pub show_progress: bool,
    pub can_go_back: bool,

    pub answers: Vec<Answer>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}
