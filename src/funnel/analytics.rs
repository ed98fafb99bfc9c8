// src/funnel/analytics.rs

use serde::Serialize;

use crate::models::{quiz::Quiz, response::QuizResponse};

/// Aggregated funnel metrics for one quiz.
#[derive(Debug, Serialize)]
pub struct FunnelReport {
    pub quiz_id: i64,
    pub slug: String,
    pub sessions: usize,
    pub completed: usize,
    pub completion_rate: f64,
    pub average_completion_seconds: Option<f64>,
    pub slides: Vec<SlideStats>,
}

#[derive(Debug, Serialize)]
pub struct SlideStats {
    pub slide_id: String,
    #[serde(rename = "type")]
    pub slide_type: &'static str,

    /// Sessions that were shown this slide.
    pub reached: usize,

    /// Sessions with a recorded answer on this slide.
    pub answered: usize,

    /// Unfinished sessions whose last position is this slide.
    pub drop_offs: usize,
    pub drop_off_rate: f64,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionStats>,
}

#[derive(Debug, Serialize)]
pub struct OptionStats {
    pub option_id: String,
    pub label: String,
    pub count: usize,
}

fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Computes reach, drop-off and answer distribution per slide.
pub fn funnel_report(quiz: &Quiz, responses: &[QuizResponse]) -> FunnelReport {
    let sessions = responses.len();
    let finished: Vec<&QuizResponse> = responses.iter().filter(|r| r.is_completed()).collect();

    let average_completion_seconds = if finished.is_empty() {
        None
    } else {
        let total_ms: i64 = finished
            .iter()
            .filter_map(|r| r.completed_at.map(|c| (c - r.started_at).num_milliseconds()))
            .sum();
        Some(total_ms as f64 / 1000.0 / finished.len() as f64)
    };

    let slides = quiz
        .slides
        .iter()
        .map(|slide| {
            let reached = responses
                .iter()
                .filter(|r| r.reached_slide_ids.iter().any(|id| *id == slide.id))
                .count();
            let answered = responses
                .iter()
                .filter(|r| r.answer_for(&slide.id).is_some())
                .count();
            let drop_offs = responses
                .iter()
                .filter(|r| !r.is_completed() && r.current_slide_id == slide.id)
                .count();

            let options = slide
                .as_choice()
                .map(|choice| {
                    choice
                        .options
                        .iter()
                        .map(|option| OptionStats {
                            option_id: option.id.clone(),
                            label: option.label.clone(),
                            count: responses
                                .iter()
                                .filter_map(|r| r.answer_for(&slide.id))
                                .filter(|a| a.option_ids.iter().any(|o| *o == option.id))
                                .count(),
                        })
                        .collect()
                })
                .unwrap_or_default();

            SlideStats {
                slide_id: slide.id.clone(),
                slide_type: slide.kind(),
                reached,
                answered,
                drop_offs,
                drop_off_rate: rate(drop_offs, reached),
                options,
            }
        })
        .collect();

    FunnelReport {
        quiz_id: quiz.id,
        slug: quiz.slug.clone(),
        sessions,
        completed: finished.len(),
        completion_rate: rate(finished.len(), sessions),
        average_completion_seconds,
        slides,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::session;
    use crate::models::quiz::fixtures::*;
    use chrono::{Duration, Utc};

    fn funnel() -> Quiz {
        quiz(vec![
            choice("start", &["a", "b"]),
            when(info("tip"), "start", "a"),
            offer("end"),
        ])
    }

    fn opts(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_report() {
        let report = funnel_report(&funnel(), &[]);
        assert_eq!(report.sessions, 0);
        assert_eq!(report.completion_rate, 0.0);
        assert!(report.average_completion_seconds.is_none());
        assert_eq!(report.slides.len(), 3);
        assert_eq!(report.slides[0].drop_off_rate, 0.0);
    }

    #[test]
    fn test_report_counts_reach_and_drop_off() {
        let q = funnel();
        let t0 = Utc::now();

        // Abandoned on the first slide.
        let idle = session::start(&q, "session-idle", t0).unwrap();

        // Took branch a, abandoned on the tip.
        let mut branch_a = session::start(&q, "session-aaaa", t0).unwrap();
        session::answer(&q, &mut branch_a, "start", opts(&["a"]), t0).unwrap();

        // Took branch b, straight to the offer.
        let mut branch_b = session::start(&q, "session-bbbb", t0).unwrap();
        session::answer(&q, &mut branch_b, "start", opts(&["b"]), t0 + Duration::seconds(30))
            .unwrap();

        let report = funnel_report(&q, &[idle, branch_a, branch_b]);

        assert_eq!(report.sessions, 3);
        assert_eq!(report.completed, 1);
        assert!((report.completion_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.average_completion_seconds, Some(30.0));

        let start = &report.slides[0];
        assert_eq!(start.reached, 3);
        assert_eq!(start.answered, 2);
        assert_eq!(start.drop_offs, 1);
        assert_eq!(start.options[0].count, 1);
        assert_eq!(start.options[1].count, 1);

        let tip = &report.slides[1];
        assert_eq!(tip.reached, 1);
        assert_eq!(tip.drop_offs, 1);
        assert_eq!(tip.drop_off_rate, 1.0);
        assert!(tip.options.is_empty());

        let end = &report.slides[2];
        assert_eq!(end.reached, 1);
        assert_eq!(end.drop_offs, 0);
    }

    #[test]
    fn test_branching_offers_not_completed_on_start() {
        let q = quiz(vec![
            choice("goal", &["a", "b"]),
            when(offer("offer-a"), "goal", "a"),
            when(offer("offer-b"), "goal", "b"),
        ]);
        let t0 = Utc::now();

        let abandoned = session::start(&q, "session-idle", t0).unwrap();
        let mut finished = session::start(&q, "session-done", t0).unwrap();
        session::answer(&q, &mut finished, "goal", opts(&["a"]), t0).unwrap();

        let report = funnel_report(&q, &[abandoned, finished]);

        assert_eq!(report.completed, 1);
        assert_eq!(report.completion_rate, 0.5);

        let goal = &report.slides[0];
        assert_eq!(goal.reached, 2);
        assert_eq!(goal.drop_offs, 1);
        assert_eq!(goal.drop_off_rate, 0.5);

        assert_eq!(report.slides[1].reached, 1);
        assert_eq!(report.slides[2].reached, 0);
    }
}
