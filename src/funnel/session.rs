// src/funnel/session.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::{FunnelError, sequencer};
use crate::models::{
    quiz::Quiz,
    response::{Answer, PlayerState, QuizResponse},
};

/// Creates a fresh response positioned at the first slide.
///
/// Returns `None` for a quiz without slides.
pub fn start(quiz: &Quiz, session_id: &str, now: DateTime<Utc>) -> Option<QuizResponse> {
    let first = sequencer::first_slide(quiz, &[])?;

    let mut response = QuizResponse {
        quiz_id: quiz.id,
        session_id: session_id.to_string(),
        answers: Vec::new(),
        current_slide_id: quiz.slides[first].id.clone(),
        reached_slide_ids: Vec::new(),
        started_at: now,
        updated_at: now,
        completed_at: None,
        revision: 0,
    };
    move_to(quiz, &mut response, first, now);

    Some(response)
}

/// Reconciles a stored response with the current quiz definition.
///
/// Drops answers that no longer apply and, if the current slide vanished or
/// is no longer visible, moves back to the first slide. Returns whether the
/// response changed.
pub fn resume(quiz: &Quiz, response: &mut QuizResponse, now: DateTime<Utc>) -> bool {
    let before = response.answers.len();
    prune_answers(quiz, response);
    let mut changed = response.answers.len() != before;

    let path = sequencer::visible_path(quiz, &response.answers);
    let on_path = quiz
        .position_of(&response.current_slide_id)
        .is_some_and(|i| path.contains(&i));

    if !on_path {
        if let Some(&first) = path.first() {
            move_to(quiz, response, first, now);
            changed = true;
        }
    }

    if changed {
        response.updated_at = now;
    }
    changed
}

/// Records the selection for the current slide and moves to the next visible one.
pub fn answer(
    quiz: &Quiz,
    response: &mut QuizResponse,
    slide_id: &str,
    option_ids: Vec<String>,
    now: DateTime<Utc>,
) -> Result<(), FunnelError> {
    let index = current_index(quiz, response, slide_id)?;
    let slide = &quiz.slides[index];
    let choice = slide
        .as_choice()
        .ok_or_else(|| FunnelError::NotAChoiceSlide(slide.id.clone()))?;

    if option_ids.is_empty() {
        return Err(FunnelError::InvalidSelection(
            "Select at least one option".to_string(),
        ));
    }
    if !choice.multi_select && option_ids.len() != 1 {
        return Err(FunnelError::InvalidSelection(format!(
            "Slide '{}' takes exactly one option",
            slide.id
        )));
    }
    let mut seen = HashSet::new();
    for option_id in &option_ids {
        if !choice.has_option(option_id) {
            return Err(FunnelError::UnknownOption {
                slide_id: slide.id.clone(),
                option_id: option_id.clone(),
            });
        }
        if !seen.insert(option_id.as_str()) {
            return Err(FunnelError::InvalidSelection(format!(
                "Option '{}' selected twice",
                option_id
            )));
        }
    }

    let recorded = Answer {
        slide_id: slide.id.clone(),
        option_ids,
        answered_at: now,
    };
    match response.answers.iter_mut().find(|a| a.slide_id == slide.id) {
        Some(existing) => *existing = recorded,
        None => response.answers.push(recorded),
    }
    prune_answers(quiz, response);
    response.updated_at = now;

    // On the last visible slide this stays put, but still records completion.
    let target = sequencer::next_slide(quiz, index, &response.answers).unwrap_or(index);
    move_to(quiz, response, target, now);

    Ok(())
}

/// Moves past the current slide. Choice slides must be answered first.
pub fn advance(
    quiz: &Quiz,
    response: &mut QuizResponse,
    slide_id: &str,
    now: DateTime<Utc>,
) -> Result<(), FunnelError> {
    let index = current_index(quiz, response, slide_id)?;
    let slide = &quiz.slides[index];

    if slide.as_choice().is_some() && response.answer_for(&slide.id).is_none() {
        return Err(FunnelError::AnswerRequired(slide.id.clone()));
    }

    let next = sequencer::next_slide(quiz, index, &response.answers)
        .ok_or(FunnelError::AtLastSlide)?;
    move_to(quiz, response, next, now);

    Ok(())
}

/// Returns to the previous visible slide. Answers are kept so the player can
/// pre-select them.
pub fn back(quiz: &Quiz, response: &mut QuizResponse, now: DateTime<Utc>) -> Result<(), FunnelError> {
    if !quiz.settings.allow_back {
        return Err(FunnelError::BackNotAllowed);
    }
    let index = quiz
        .position_of(&response.current_slide_id)
        .ok_or_else(|| FunnelError::UnknownSlide(response.current_slide_id.clone()))?;

    let previous = sequencer::previous_slide(quiz, index, &response.answers)
        .ok_or(FunnelError::AtFirstSlide)?;
    move_to(quiz, response, previous, now);

    Ok(())
}

/// Renders the response into what the player displays.
pub fn snapshot(quiz: &Quiz, response: &QuizResponse) -> Result<PlayerState, FunnelError> {
    let index = quiz
        .position_of(&response.current_slide_id)
        .ok_or_else(|| FunnelError::UnknownSlide(response.current_slide_id.clone()))?;
    let progress = sequencer::progress(quiz, index, &response.answers);
    let can_go_back = quiz.settings.allow_back
        && sequencer::previous_slide(quiz, index, &response.answers).is_some();

    Ok(PlayerState {
        session_id: response.session_id.clone(),
        quiz_slug: quiz.slug.clone(),
        current_slide: quiz.slides[index].clone(),
        position: progress.position,
        total: progress.total,
        show_progress: quiz.settings.show_progress,
        can_go_back,
        answers: response.answers.clone(),
        completed: response.is_completed(),
        completed_at: response.completed_at,
    })
}

fn current_index(
    quiz: &Quiz,
    response: &QuizResponse,
    slide_id: &str,
) -> Result<usize, FunnelError> {
    if response.current_slide_id != slide_id {
        return Err(FunnelError::NotCurrentSlide {
            current: response.current_slide_id.clone(),
            requested: slide_id.to_string(),
        });
    }
    quiz.position_of(slide_id)
        .ok_or_else(|| FunnelError::UnknownSlide(slide_id.to_string()))
}

/// Positions the response on `index`, recording the visit and completion.
fn move_to(quiz: &Quiz, response: &mut QuizResponse, index: usize, now: DateTime<Utc>) {
    let slide_id = &quiz.slides[index].id;

    response.current_slide_id = slide_id.clone();
    if !response.reached_slide_ids.contains(slide_id) {
        response.reached_slide_ids.push(slide_id.clone());
    }
    // Arriving on the terminal screen completes the funnel; completion is sticky.
    // An unanswered choice is never terminal: its answer may reveal more slides.
    let slide = &quiz.slides[index];
    let awaiting_answer = slide.as_choice().is_some() && response.answer_for(&slide.id).is_none();
    if response.completed_at.is_none()
        && !awaiting_answer
        && sequencer::next_slide(quiz, index, &response.answers).is_none()
    {
        response.completed_at = Some(now);
    }
    response.updated_at = now;
}

/// Keeps only answers for slides that still exist and are on the visible path.
fn prune_answers(quiz: &Quiz, response: &mut QuizResponse) {
    let path = sequencer::visible_path(quiz, &response.answers);
    response.answers.retain(|a| {
        quiz.position_of(&a.slide_id)
            .is_some_and(|i| path.contains(&i))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::{SlideContent, fixtures::*};

    /// start(a|b) -> [if a] tip -> size(s|m|l) -> end
    fn funnel() -> Quiz {
        quiz(vec![
            choice("start", &["a", "b"]),
            when(info("tip"), "start", "a"),
            choice("size", &["s", "m", "l"]),
            offer("end"),
        ])
    }

    fn started(q: &Quiz) -> QuizResponse {
        start(q, "session-1234", Utc::now()).unwrap()
    }

    fn opts(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_start_positions_on_first_slide() {
        let q = funnel();
        let r = started(&q);

        assert_eq!(r.current_slide_id, "start");
        assert_eq!(r.reached_slide_ids, vec!["start"]);
        assert!(r.completed_at.is_none());
    }

    #[test]
    fn test_start_empty_quiz() {
        let q = quiz(vec![]);
        assert!(start(&q, "session-1234", Utc::now()).is_none());
    }

    /// goal(a|b) -> [if a] offer-a, [if b] offer-b
    fn split_offer() -> Quiz {
        quiz(vec![
            choice("goal", &["a", "b"]),
            when(offer("offer-a"), "goal", "a"),
            when(offer("offer-b"), "goal", "b"),
        ])
    }

    #[test]
    fn test_unanswered_choice_is_not_terminal() {
        let q = split_offer();
        let mut r = started(&q);
        assert_eq!(r.current_slide_id, "goal");
        assert!(r.completed_at.is_none());

        let state = snapshot(&q, &r).unwrap();
        assert!(!state.completed);

        answer(&q, &mut r, "goal", opts(&["b"]), Utc::now()).unwrap();
        assert_eq!(r.current_slide_id, "offer-b");
        assert!(r.is_completed());
    }

    #[test]
    fn test_answering_last_choice_completes() {
        let q = quiz(vec![info("intro"), choice("last", &["x", "y"])]);
        let mut r = started(&q);
        advance(&q, &mut r, "intro", Utc::now()).unwrap();
        assert_eq!(r.current_slide_id, "last");
        assert!(!r.is_completed());

        answer(&q, &mut r, "last", opts(&["y"]), Utc::now()).unwrap();
        assert_eq!(r.current_slide_id, "last");
        assert!(r.is_completed());
    }

    #[test]
    fn test_single_slide_quiz_completes_on_start() {
        let q = quiz(vec![offer("end")]);
        let r = started(&q);
        assert!(r.is_completed());
    }

    #[test]
    fn test_answer_follows_branch() {
        let q = funnel();
        let mut r = started(&q);

        answer(&q, &mut r, "start", opts(&["a"]), Utc::now()).unwrap();
        assert_eq!(r.current_slide_id, "tip");

        let mut r = started(&q);
        answer(&q, &mut r, "start", opts(&["b"]), Utc::now()).unwrap();
        assert_eq!(r.current_slide_id, "size");
    }

    #[test]
    fn test_answer_rejects_stale_slide() {
        let q = funnel();
        let mut r = started(&q);

        let err = answer(&q, &mut r, "size", opts(&["s"]), Utc::now()).unwrap_err();
        assert!(matches!(err, FunnelError::NotCurrentSlide { .. }));
    }

    #[test]
    fn test_answer_rejects_bad_selection() {
        let q = funnel();
        let mut r = started(&q);

        let err = answer(&q, &mut r, "start", opts(&["a", "b"]), Utc::now()).unwrap_err();
        assert!(matches!(err, FunnelError::InvalidSelection(_)));

        let err = answer(&q, &mut r, "start", opts(&["zzz"]), Utc::now()).unwrap_err();
        assert!(matches!(err, FunnelError::UnknownOption { .. }));

        let err = answer(&q, &mut r, "start", vec![], Utc::now()).unwrap_err();
        assert!(matches!(err, FunnelError::InvalidSelection(_)));

        assert_eq!(r.current_slide_id, "start");
        assert!(r.answers.is_empty());
    }

    #[test]
    fn test_multi_select_duplicates_rejected() {
        let mut q = funnel();
        if let SlideContent::Choice(c) = &mut q.slides[0].content {
            c.multi_select = true;
        }
        let mut r = started(&q);

        let err = answer(&q, &mut r, "start", opts(&["a", "a"]), Utc::now()).unwrap_err();
        assert!(matches!(err, FunnelError::InvalidSelection(_)));

        answer(&q, &mut r, "start", opts(&["a", "b"]), Utc::now()).unwrap();
        assert_eq!(r.current_slide_id, "tip");
    }

    #[test]
    fn test_answer_on_info_slide_rejected() {
        let q = funnel();
        let mut r = started(&q);
        answer(&q, &mut r, "start", opts(&["a"]), Utc::now()).unwrap();

        let err = answer(&q, &mut r, "tip", opts(&["a"]), Utc::now()).unwrap_err();
        assert_eq!(err, FunnelError::NotAChoiceSlide("tip".to_string()));
    }

    #[test]
    fn test_advance_requires_answer_on_choice() {
        let q = funnel();
        let mut r = started(&q);

        let err = advance(&q, &mut r, "start", Utc::now()).unwrap_err();
        assert_eq!(err, FunnelError::AnswerRequired("start".to_string()));
    }

    #[test]
    fn test_advance_through_to_completion() {
        let q = funnel();
        let mut r = started(&q);

        answer(&q, &mut r, "start", opts(&["a"]), Utc::now()).unwrap();
        advance(&q, &mut r, "tip", Utc::now()).unwrap();
        assert_eq!(r.current_slide_id, "size");
        assert!(!r.is_completed());

        answer(&q, &mut r, "size", opts(&["m"]), Utc::now()).unwrap();
        assert_eq!(r.current_slide_id, "end");
        assert!(r.is_completed());
        assert_eq!(r.reached_slide_ids, vec!["start", "tip", "size", "end"]);

        let err = advance(&q, &mut r, "end", Utc::now()).unwrap_err();
        assert_eq!(err, FunnelError::AtLastSlide);
    }

    #[test]
    fn test_back_skips_hidden_and_respects_settings() {
        let mut q = funnel();
        let mut r = started(&q);

        answer(&q, &mut r, "start", opts(&["b"]), Utc::now()).unwrap();
        assert_eq!(r.current_slide_id, "size");

        back(&q, &mut r, Utc::now()).unwrap();
        assert_eq!(r.current_slide_id, "start");
        assert_eq!(back(&q, &mut r, Utc::now()).unwrap_err(), FunnelError::AtFirstSlide);

        q.settings.allow_back = false;
        assert_eq!(back(&q, &mut r, Utc::now()).unwrap_err(), FunnelError::BackNotAllowed);
    }

    #[test]
    fn test_changing_answer_prunes_hidden_branch() {
        let q = quiz(vec![
            choice("start", &["a", "b"]),
            when(choice("detail", &["x", "y"]), "start", "a"),
            offer("end"),
        ]);
        let mut r = started(&q);

        answer(&q, &mut r, "start", opts(&["a"]), Utc::now()).unwrap();
        answer(&q, &mut r, "detail", opts(&["x"]), Utc::now()).unwrap();
        assert_eq!(r.answers.len(), 2);

        back(&q, &mut r, Utc::now()).unwrap();
        back(&q, &mut r, Utc::now()).unwrap();
        answer(&q, &mut r, "start", opts(&["b"]), Utc::now()).unwrap();

        assert_eq!(r.current_slide_id, "end");
        assert_eq!(r.answers.len(), 1);
        assert!(r.answer_for("detail").is_none());
    }

    #[test]
    fn test_completion_is_sticky() {
        let q = funnel();
        let mut r = started(&q);
        answer(&q, &mut r, "start", opts(&["b"]), Utc::now()).unwrap();
        answer(&q, &mut r, "size", opts(&["l"]), Utc::now()).unwrap();
        let completed_at = r.completed_at;
        assert!(completed_at.is_some());

        back(&q, &mut r, Utc::now()).unwrap();
        assert_eq!(r.completed_at, completed_at);
    }

    #[test]
    fn test_resume_after_slide_removed() {
        let q = funnel();
        let mut r = started(&q);
        answer(&q, &mut r, "start", opts(&["b"]), Utc::now()).unwrap();
        assert_eq!(r.current_slide_id, "size");

        let republished = quiz(vec![choice("start", &["a", "b"]), offer("end")]);
        assert!(resume(&republished, &mut r, Utc::now()));
        assert_eq!(r.current_slide_id, "start");

        // Nothing left to reconcile.
        assert!(!resume(&republished, &mut r, Utc::now()));
    }

    #[test]
    fn test_snapshot_reports_progress() {
        let q = funnel();
        let mut r = started(&q);
        answer(&q, &mut r, "start", opts(&["a"]), Utc::now()).unwrap();

        let state = snapshot(&q, &r).unwrap();
        assert_eq!(state.current_slide.id, "tip");
        assert_eq!(state.position, 2);
        assert_eq!(state.total, 4);
        assert!(state.can_go_back);
        assert!(!state.completed);
    }
}
