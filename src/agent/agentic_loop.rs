//! Tool-calling agent loop.
//!
//! Drives one conversation turn: fetch the tool catalog, call the model with
//! the full transcript, execute any requested tools through the provider,
//! append the results and repeat until the model answers without tool calls
//! or the round cap is hit.

use crate::agent::client::CompletionService;
use crate::agent::conversation::{upsert_system_message, validate_transcript};
use crate::agent::prompts::build_chat_system_prompt;
use crate::agent::types::*;
use crate::config::DEFAULT_MAX_TOOL_ROUNDS;
use crate::error::{Error, Result};
use crate::tools::{preview, ToolCall, ToolCatalog, ToolExecutor, ToolProvider, ToolResult};

use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Final text when the round cap is reached
pub const ROUND_LIMIT_MESSAGE: &str =
    "I hit the max tool-call rounds; try simplifying the request.";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Limits and generation settings for the loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Maximum model calls before the loop gives up.
    pub max_rounds: u32,
    /// Generation options passed on every model call.
    pub generation_options: GenerationOptions,
    /// Text returned when the round cap is reached.
    pub fallback_message: String,
}

impl LoopConfig {
    /// Default settings with a custom round cap.
    pub fn with_max_rounds(max_rounds: u32) -> Self {
        Self {
            max_rounds,
            ..Self::default()
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            generation_options: GenerationOptions::default(),
            fallback_message: ROUND_LIMIT_MESSAGE.into(),
        }
    }
}

/// How the loop finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The model answered without requesting tools.
    Completed,
    /// Every round requested tools; the fallback message was returned.
    RoundLimitReached,
}

// ---------------------------------------------------------------------------
// Callback trait
// ---------------------------------------------------------------------------

/// Hooks for callers that want progress events (e.g. a CLI spinner).
#[async_trait]
pub trait LoopCallback: Send + Sync {
    /// Called before each model call.
    async fn on_round_start(&self, _round: u32) {}
    /// Called after each individual tool has been executed.
    async fn on_tool_executed(&self, _tool_name: &str, _result: &ToolResult) {}
}

/// Default no-op callback.
#[derive(Debug, Default)]
pub struct NoOpCallback;

#[async_trait]
impl LoopCallback for NoOpCallback {}

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Everything the loop needs to run.
pub struct AgentLoopInput<'a, C: LoopCallback> {
    /// The conversation so far, oldest first.
    pub messages: Vec<Message>,
    /// Model to call.
    pub completion: &'a dyn CompletionService,
    /// Where the tools live.
    pub provider: &'a dyn ToolProvider,
    /// Loop configuration.
    pub config: LoopConfig,
    /// Model to use instead of the service default.
    pub model_override: Option<String>,
    /// Description of the user's uploaded data, rendered into the system prompt.
    pub domain_context: Option<String>,
    /// Event callback.
    pub callback: C,
}

impl<'a> AgentLoopInput<'a, NoOpCallback> {
    /// Input with default configuration and no callback.
    pub fn new(
        messages: Vec<Message>,
        completion: &'a dyn CompletionService,
        provider: &'a dyn ToolProvider,
    ) -> Self {
        AgentLoopInput {
            messages,
            completion,
            provider,
            config: LoopConfig::default(),
            model_override: None,
            domain_context: None,
            callback: NoOpCallback,
        }
    }
}

/// The result of running the loop.
#[derive(Debug, Clone)]
pub struct AgentLoopOutput {
    /// The final assistant text.
    pub response: String,
    /// The full transcript, including tool calls and results.
    pub messages: Vec<Message>,
    /// Number of model calls made.
    pub rounds: u32,
    /// How the loop finished.
    pub outcome: LoopOutcome,
    /// Token usage summed over all model calls.
    pub total_usage: Usage,
}

impl AgentLoopOutput {
    /// Split into `(final_text, transcript)`.
    pub fn into_parts(self) -> (String, Vec<Message>) {
        (self.response, self.messages)
    }
}

// ---------------------------------------------------------------------------
// Core loop implementation
// ---------------------------------------------------------------------------

/// Run the agent loop.
///
/// Fails before any model call when the input is empty, the round cap is
/// zero, the transcript is malformed, or the tool catalog cannot be fetched.
/// A failed model call ends the loop with an error. Tool failures never do:
/// they are handed back to the model as error results.
pub async fn run_agentic_loop<C: LoopCallback>(
    input: AgentLoopInput<'_, C>,
) -> Result<AgentLoopOutput> {
    let AgentLoopInput {
        mut messages,
        completion,
        provider,
        config,
        model_override,
        domain_context,
        callback,
    } = input;

    if config.max_rounds == 0 {
        return Err(Error::InvalidInput("max_rounds must be at least 1".into()));
    }
    validate_transcript(&messages)?;

    let loop_start = Instant::now();

    let catalog = ToolCatalog::fetch(provider).await?;
    let tool_definitions = catalog.definitions();
    let executor = ToolExecutor::new(provider, &catalog);

    let system_prompt = build_chat_system_prompt(domain_context.as_deref())?;
    upsert_system_message(&mut messages, system_prompt);

    let model = model_override
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| completion.default_model().to_string());

    let mut total_usage = Usage::default();
    let mut tool_calls_made: u32 = 0;

    for round in 1..=config.max_rounds {
        info!("Agent loop round {}/{}", round, config.max_rounds);
        callback.on_round_start(round).await;

        let request = ChatCompletionRequest::with_tools(
            model.clone(),
            messages.clone(),
            tool_definitions.clone(),
            config.generation_options.clone(),
        );

        let response = completion.complete(request).await.map_err(|e| {
            warn!("Model call failed in round {}: {}", round, e);
            e
        })?;

        if let Some(ref usage) = response.usage {
            total_usage.accumulate(usage);
        }

        let Some(choice) = response.choices.into_iter().next() else {
            return Err(Error::ModelCall("completion returned no choices".into()));
        };

        let mut assistant = choice.message;
        if assistant.tool_calls.as_ref().is_some_and(|calls| calls.is_empty()) {
            assistant.tool_calls = None;
        }

        info!(
            "Model finish_reason: {}, has_content: {}, tool_calls: {}",
            choice.finish_reason.as_deref().unwrap_or("unknown"),
            !assistant.text().is_empty(),
            assistant.requested_tool_calls().len()
        );

        let requests = assistant.requested_tool_calls().to_vec();
        messages.push(assistant);

        // --- No tool calls: content is the final response -----------------
        if requests.is_empty() {
            let response = messages
                .last()
                .map(|m| m.text().to_string())
                .unwrap_or_default();
            debug!("Agent reply: {}", preview(&response, 500));

            info!(
                "Agent loop completed: rounds={}, tool_calls={}, duration={}ms",
                round,
                tool_calls_made,
                loop_start.elapsed().as_millis()
            );

            return Ok(AgentLoopOutput {
                response,
                messages,
                rounds: round,
                outcome: LoopOutcome::Completed,
                total_usage,
            });
        }

        // --- Tool calls, in the order the model listed them ---------------
        for request in &requests {
            tool_calls_made += 1;
            let call = ToolCall::from_request(request);

            info!("Executing tool: {} (call #{})", call.name, tool_calls_made);
            debug!("Tool {} arguments: {}", call.name, call.arguments);

            let result = executor.invoke(&call.name, call.arguments).await;
            callback.on_tool_executed(&call.name, &result).await;

            messages.push(Message::tool(
                call.id,
                call.name,
                result.to_message_content(),
            ));
        }
    }

    warn!(
        "Agent loop hit the round cap ({}) after {} tool calls",
        config.max_rounds, tool_calls_made
    );

    Ok(AgentLoopOutput {
        response: config.fallback_message,
        messages,
        rounds: config.max_rounds,
        outcome: LoopOutcome::RoundLimitReached,
        total_usage,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
