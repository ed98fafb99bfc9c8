// src/funnel/mod.rs

//! Quiz funnel runtime: slide sequencing, the per-session state machine,
//! and funnel analytics. Everything here is pure and storage agnostic.

pub mod analytics;
pub mod sequencer;
pub mod session;

use std::fmt;

/// Rejected player transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunnelError {
    /// The quiz has no slide with this id.
    UnknownSlide(String),

    /// The client acted on a slide that is no longer current.
    NotCurrentSlide { current: String, requested: String },

    NotAChoiceSlide(String),

    UnknownOption { slide_id: String, option_id: String },

    InvalidSelection(String),

    /// A choice slide must be answered before moving on.
    AnswerRequired(String),

    BackNotAllowed,

    AtFirstSlide,

    AtLastSlide,
}

impl fmt::Display for FunnelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunnelError::UnknownSlide(id) => write!(f, "Unknown slide '{}'", id),
            FunnelError::NotCurrentSlide { current, requested } => write!(
                f,
                "Slide '{}' is not the current slide (current is '{}')",
                requested, current
            ),
            FunnelError::NotAChoiceSlide(id) => write!(f, "Slide '{}' does not take answers", id),
            FunnelError::UnknownOption { slide_id, option_id } => {
                write!(f, "Slide '{}' has no option '{}'", slide_id, option_id)
            }
            FunnelError::InvalidSelection(msg) => write!(f, "{}", msg),
            FunnelError::AnswerRequired(id) => write!(f, "Slide '{}' must be answered first", id),
            FunnelError::BackNotAllowed => write!(f, "This quiz does not allow going back"),
            FunnelError::AtFirstSlide => write!(f, "Already at the first slide"),
            FunnelError::AtLastSlide => write!(f, "Already at the last slide"),
        }
    }
}

impl std::error::Error for FunnelError {}
