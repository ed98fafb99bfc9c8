// src/models/quiz.rs

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;
use validator::{Validate, ValidationError};

use crate::utils::html::clean_html;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug pattern"));

static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid color pattern"));

/// A published quiz funnel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,

    /// Public key used in player URLs.
    pub slug: String,

    pub name: String,

    pub settings: QuizSettings,

    /// Slides in display order.
    pub slides: Vec<Slide>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quiz {
    /// Index of the slide with the given id.
    pub fn position_of(&self, slide_id: &str) -> Option<usize> {
        self.slides.iter().position(|s| s.id == slide_id)
    }
}

/// Presentation flags shared by every slide of a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSettings {
    #[serde(default = "default_primary_color")]
    pub primary_color: String,

    #[serde(default = "default_true")]
    pub show_progress: bool,

    /// Whether respondents may navigate to the previous slide.
    #[serde(default = "default_true")]
    pub allow_back: bool,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            primary_color: default_primary_color(),
            show_progress: true,
            allow_back: true,
        }
    }
}

fn default_primary_color() -> String {
    "#2563eb".to_string()
}

fn default_true() -> bool {
    true
}

/// One screen of the funnel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub id: String,

    /// Serialized as `"type"` plus a type-specific `"content"` object.
    #[serde(flatten)]
    pub content: SlideContent,

    /// Display rule. Slides without one are always shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl Slide {
    pub fn kind(&self) -> &'static str {
        self.content.kind()
    }

    pub fn as_choice(&self) -> Option<&ChoiceContent> {
        match &self.content {
            SlideContent::Choice(choice) => Some(choice),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum SlideContent {
    Choice(ChoiceContent),
    Info(InfoContent),
    Loading(LoadingContent),
    Results(ResultsContent),
    Offer(OfferContent),
}

impl SlideContent {
    pub fn kind(&self) -> &'static str {
        match self {
            SlideContent::Choice(_) => "choice",
            SlideContent::Info(_) => "info",
            SlideContent::Loading(_) => "loading",
            SlideContent::Results(_) => "results",
            SlideContent::Offer(_) => "offer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceContent {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub options: Vec<ChoiceOption>,
    #[serde(default)]
    pub multi_select: bool,
}

impl ChoiceContent {
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoContent {
    pub title: String,
    /// Rich HTML, sanitized on publish.
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadingContent {
    pub title: String,
    /// How long the player shows the screen before advancing on its own.
    pub duration_ms: u32,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsContent {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferContent {
    pub headline: String,
    pub body: String,
    pub cta_text: String,
    pub cta_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_label: Option<String>,
}

/// Show the owning slide only if `option_id` was selected on `slide_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub slide_id: String,
    pub option_id: String,
}

/// Listing row for the admin index.
#[derive(Debug, Clone, Serialize)]
pub struct QuizSummary {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub slide_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// A validated, sanitized definition ready to be stored.
#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub slug: String,
    pub name: String,
    pub settings: QuizSettings,
    pub slides: Vec<Slide>,
}

/// DTO for publishing (creating or replacing) a quiz by slug.
#[derive(Debug, Deserialize, Validate)]
pub struct PublishQuizRequest {
    #[validate(length(min = 1, max = 100), custom(function = validate_slug))]
    pub slug: String,

    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[serde(default)]
    #[validate(custom(function = validate_settings))]
    pub settings: QuizSettings,

    #[validate(length(min = 1, max = 200), custom(function = validate_slides))]
    pub slides: Vec<Slide>,
}

impl PublishQuizRequest {
    /// Strips unsafe markup from every HTML body.
    pub fn into_new_quiz(self) -> NewQuiz {
        let slides = self
            .slides
            .into_iter()
            .map(|mut slide| {
                match &mut slide.content {
                    SlideContent::Info(info) => info.body = clean_html(&info.body),
                    SlideContent::Results(results) => results.body = clean_html(&results.body),
                    SlideContent::Offer(offer) => offer.body = clean_html(&offer.body),
                    SlideContent::Choice(_) | SlideContent::Loading(_) => {}
                }
                slide
            })
            .collect();

        NewQuiz {
            slug: self.slug,
            name: self.name,
            settings: self.settings,
            slides,
        }
    }
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if !SLUG_RE.is_match(slug) {
        return Err(ValidationError::new("invalid_slug")
            .with_message("Slug must be lowercase words separated by dashes".into()));
    }
    Ok(())
}

fn validate_settings(settings: &QuizSettings) -> Result<(), ValidationError> {
    if !COLOR_RE.is_match(&settings.primary_color) {
        return Err(ValidationError::new("invalid_color")
            .with_message("primary_color must look like #RRGGBB".into()));
    }
    Ok(())
}

fn validate_slides(slides: &[Slide]) -> Result<(), ValidationError> {
    check_slides(slides)
        .map_err(|msg| ValidationError::new("invalid_slides").with_message(msg.into()))
}

/// Structural checks on a slide list. Returns a human readable reason on failure.
pub fn check_slides(slides: &[Slide]) -> Result<(), String> {
    let mut seen: HashSet<&str> = HashSet::new();

    for (index, slide) in slides.iter().enumerate() {
        if slide.id.trim().is_empty() || slide.id.len() > 64 {
            return Err(format!("Slide #{} has an invalid id", index + 1));
        }
        if !seen.insert(slide.id.as_str()) {
            return Err(format!("Duplicate slide id '{}'", slide.id));
        }

        match &slide.content {
            SlideContent::Choice(choice) => check_choice(&slide.id, choice)?,
            SlideContent::Loading(loading) => {
                if loading.messages.is_empty() {
                    return Err(format!("Loading slide '{}' needs at least one message", slide.id));
                }
            }
            SlideContent::Offer(offer) => check_cta_url(&slide.id, &offer.cta_url)?,
            SlideContent::Info(_) | SlideContent::Results(_) => {}
        }

        if let Some(condition) = &slide.condition {
            // Only slides already seen (earlier in the list) may be referenced.
            let target = slides[..index]
                .iter()
                .find(|s| s.id == condition.slide_id)
                .ok_or_else(|| {
                    format!(
                        "Slide '{}' depends on '{}', which is not an earlier slide",
                        slide.id, condition.slide_id
                    )
                })?;
            let choice = target.as_choice().ok_or_else(|| {
                format!(
                    "Slide '{}' depends on '{}', which is not a choice slide",
                    slide.id, target.id
                )
            })?;
            if !choice.has_option(&condition.option_id) {
                return Err(format!(
                    "Slide '{}' depends on unknown option '{}' of '{}'",
                    slide.id, condition.option_id, target.id
                ));
            }
        }
    }

    Ok(())
}

fn check_choice(slide_id: &str, choice: &ChoiceContent) -> Result<(), String> {
    if choice.question.trim().is_empty() {
        return Err(format!("Choice slide '{}' has no question", slide_id));
    }
    if choice.options.len() < 2 {
        return Err(format!("Choice slide '{}' needs at least two options", slide_id));
    }
    let mut ids = HashSet::new();
    for option in &choice.options {
        if option.id.trim().is_empty() || option.label.trim().is_empty() {
            return Err(format!("Choice slide '{}' has an option without id or label", slide_id));
        }
        if !ids.insert(option.id.as_str()) {
            return Err(format!(
                "Choice slide '{}' repeats option id '{}'",
                slide_id, option.id
            ));
        }
    }
    Ok(())
}

fn check_cta_url(slide_id: &str, cta_url: &str) -> Result<(), String> {
    match Url::parse(cta_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        _ => Err(format!("Offer slide '{}' has an invalid cta_url", slide_id)),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn choice(id: &str, options: &[&str]) -> Slide {
        Slide {
            id: id.to_string(),
            content: SlideContent::Choice(ChoiceContent {
                question: format!("Question {}", id),
                subtitle: None,
                options: options
                    .iter()
                    .map(|o| ChoiceOption {
                        id: o.to_string(),
                        label: o.to_uppercase(),
                        emoji: None,
                    })
                    .collect(),
                multi_select: false,
            }),
            condition: None,
        }
    }

    pub fn info(id: &str) -> Slide {
        Slide {
            id: id.to_string(),
            content: SlideContent::Info(InfoContent {
                title: format!("Info {}", id),
                body: "<p>Hello</p>".to_string(),
                button_text: None,
            }),
            condition: None,
        }
    }

    pub fn offer(id: &str) -> Slide {
        Slide {
            id: id.to_string(),
            content: SlideContent::Offer(OfferContent {
                headline: "Deal".to_string(),
                body: "<p>Buy</p>".to_string(),
                cta_text: "Go".to_string(),
                cta_url: "https://example.com/buy".to_string(),
                price_label: None,
            }),
            condition: None,
        }
    }

    pub fn when(mut slide: Slide, slide_id: &str, option_id: &str) -> Slide {
        slide.condition = Some(Condition {
            slide_id: slide_id.to_string(),
            option_id: option_id.to_string(),
        });
        slide
    }

    pub fn quiz(slides: Vec<Slide>) -> Quiz {
        let now = Utc::now();
        Quiz {
            id: 1,
            slug: "test-quiz".to_string(),
            name: "Test quiz".to_string(),
            settings: QuizSettings::default(),
            slides,
            created_at: now,
            updated_at: now,
        }
    }
}
