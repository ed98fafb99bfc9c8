// src/utils/html.rs

/// Cleans slide HTML with ammonia's whitelist: safe formatting tags survive,
/// `<script>`/`<iframe>` and event-handler attributes are removed.
///
/// Script bodies are dropped together with the tag.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
