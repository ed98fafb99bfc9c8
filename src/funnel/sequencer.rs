// src/funnel/sequencer.rs

use std::collections::HashSet;

use serde::Serialize;

use crate::models::{
    quiz::{Quiz, Slide},
    response::Answer,
};

/// Position of a slide within the visible path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// 1-based.
    pub position: usize,
    pub total: usize,
}

/// Evaluates a slide's display rule against the recorded answers.
pub fn is_visible(slide: &Slide, answers: &[Answer]) -> bool {
    match &slide.condition {
        None => true,
        Some(condition) => answers
            .iter()
            .find(|a| a.slide_id == condition.slide_id)
            .is_some_and(|a| a.option_ids.iter().any(|o| *o == condition.option_id)),
    }
}

/// Indices of every slide the respondent will see, in order.
///
/// A conditional slide is only shown when the slide it depends on was itself
/// shown earlier in the path, so a stale answer on a hidden slide never
/// unlocks anything.
pub fn visible_path(quiz: &Quiz, answers: &[Answer]) -> Vec<usize> {
    let mut shown: HashSet<&str> = HashSet::new();
    let mut path = Vec::with_capacity(quiz.slides.len());

    for (index, slide) in quiz.slides.iter().enumerate() {
        let visible = match &slide.condition {
            None => true,
            Some(condition) => {
                shown.contains(condition.slide_id.as_str()) && is_visible(slide, answers)
            }
        };
        if visible {
            shown.insert(slide.id.as_str());
            path.push(index);
        }
    }

    path
}

pub fn first_slide(quiz: &Quiz, answers: &[Answer]) -> Option<usize> {
    visible_path(quiz, answers).first().copied()
}

/// First visible slide after `from`.
pub fn next_slide(quiz: &Quiz, from: usize, answers: &[Answer]) -> Option<usize> {
    visible_path(quiz, answers).into_iter().find(|&i| i > from)
}

/// Last visible slide before `from`.
pub fn previous_slide(quiz: &Quiz, from: usize, answers: &[Answer]) -> Option<usize> {
    visible_path(quiz, answers)
        .into_iter()
        .rev()
        .find(|&i| i < from)
}

pub fn progress(quiz: &Quiz, at: usize, answers: &[Answer]) -> Progress {
    let path = visible_path(quiz, answers);
    Progress {
        position: path.iter().take_while(|&&i| i <= at).count(),
        total: path.len(),
    }
}
