//! Conversation state helpers
//!
//! The caller owns the message log; these helpers check and prepare it
//! before the agent loop appends to it.

use crate::agent::types::{Message, Role};
use crate::error::{Error, Result};

/// Install `prompt` as the leading system message.
///
/// Overwrites the content of an existing leading system message, otherwise
/// prepends a new one.
pub fn upsert_system_message(messages: &mut Vec<Message>, prompt: impl Into<String>) {
    let prompt = prompt.into();
    match messages.first_mut() {
        Some(first) if first.role == Role::System => first.content = Some(prompt),
        _ => messages.insert(0, Message::system(prompt)),
    }
}

/// Check that every `tool` message answers a request from the assistant
/// message that precedes its run of tool messages.
pub fn validate_transcript(messages: &[Message]) -> Result<()> {
    if messages.is_empty() {
        return Err(Error::InvalidInput("messages is required".into()));
    }

    let mut pending: Option<&Message> = None;
    for (i, message) in messages.iter().enumerate() {
        match message.role {
            Role::Tool => {
                let call_id = message.tool_call_id.as_deref().ok_or_else(|| {
                    Error::InvalidInput(format!("tool message {} has no tool_call_id", i))
                })?;

                let answered = pending
                    .map(|assistant| {
                        assistant
                            .requested_tool_calls()
                            .iter()
                            .any(|call| call.id == call_id)
                    })
                    .unwrap_or(false);

                if !answered {
                    return Err(Error::InvalidInput(format!(
                        "tool message {} answers unknown tool call '{}'",
                        i, call_id
                    )));
                }
            }
            Role::Assistant => pending = Some(message),
            Role::System | Role::User => pending = None,
        }
    }

    Ok(())
}
