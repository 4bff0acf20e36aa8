//! Conversation titles
//!
//! One short model call turns the first user message into a few-word title.
//! Every failure path degrades to a deterministic title built from the
//! message itself, so callers always get something to show.

use tracing::{debug, warn};

use crate::agent::client::CompletionService;
use crate::agent::prompts::TITLE_SYSTEM_PROMPT;
use crate::agent::types::{ChatCompletionRequest, GenerationOptions, Message};
use crate::config::TitleConfig;

/// Title for conversations that start with a blank message
pub const DEFAULT_TITLE: &str = "New chat";

/// Token budget for the title call
const TITLE_MAX_TOKENS: u32 = 20;

/// Characters kept from the first line by the fallback
const FALLBACK_CHARS: usize = 50;

/// Quote characters stripped from both ends of a model title
const QUOTES: &[char] = &['"', '\'', '`', '“', '”', '‘', '’', '«', '»'];

/// Title derived from the message text alone: its first non-empty line,
/// cut to 50 characters with `...` appended when something was cut.
pub fn fallback_title(first_message: &str) -> String {
    let Some(line) = first_message.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return DEFAULT_TITLE.to_string();
    };

    match line.char_indices().nth(FALLBACK_CHARS) {
        Some((end, _)) => format!("{}...", &line[..end]),
        None => line.to_string(),
    }
}

/// Clean up a model-written title.
///
/// Steps, in order: strip surrounding quotes, drop punctuation, collapse
/// whitespace, keep the first `max_words` words, cap at `max_chars`
/// characters without leaving half a word. May return an empty string.
pub fn sanitize_title(raw: &str, max_words: usize, max_chars: usize) -> String {
    let unquoted = raw.trim().trim_matches(QUOTES);

    let cleaned: String = unquoted
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    let words = cleaned
        .split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ");

    cap_chars(&words, max_chars)
}

/// At most `max_chars` characters, dropping a word the cut lands inside.
/// A single word longer than the cap is cut hard.
fn cap_chars(text: &str, max_chars: usize) -> String {
    let Some((end, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let head = &text[..end];
    if text[end..].starts_with(char::is_whitespace) {
        return head.trim_end().to_string();
    }

    match head.rfind(char::is_whitespace) {
        Some(boundary) => head[..boundary].trim_end().to_string(),
        None => head.to_string(),
    }
}

/// Generate a title for a conversation that starts with `first_message`.
///
/// Never fails: a blank message, a model error, a timeout or an empty
/// sanitized title all fall back to [`fallback_title`].
pub async fn generate_title(
    completion: &dyn CompletionService,
    first_message: &str,
    model_override: Option<&str>,
    config: &TitleConfig,
) -> String {
    let fallback = fallback_title(first_message);
    if first_message.trim().is_empty() {
        return fallback;
    }

    let model = model_override
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| completion.default_model())
        .to_string();

    let request = ChatCompletionRequest::new(
        model,
        vec![
            Message::system(TITLE_SYSTEM_PROMPT),
            Message::user(first_message),
        ],
        GenerationOptions::short(TITLE_MAX_TOKENS),
    );

    let raw = match tokio::time::timeout(config.timeout(), completion.complete(request)).await {
        Ok(Ok(response)) => response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.text().to_string())
            .unwrap_or_default(),
        Ok(Err(e)) => {
            warn!("Title generation failed: {}", e);
            return fallback;
        }
        Err(_) => {
            warn!("Title generation timed out after {:?}", config.timeout());
            return fallback;
        }
    };

    let title = sanitize_title(&raw, config.max_words, config.max_chars);
    debug!("Title: raw={:?} sanitized={:?}", raw, title);

    if title.is_empty() {
        fallback
    } else {
        title
    }
}
