//! Agent module - LLM logic, prompt engineering, and the completion client
//!
//! This module handles all AI-related functionality including:
//! - OpenAI-compatible chat-completions client
//! - Message types and conversation checks
//! - Prompt templates for the gene program assistant
//! - The tool-calling agent loop
//! - Conversation title generation

pub mod agentic_loop;
mod client;
mod conversation;
pub mod prompts;
pub mod title;
mod types;

pub use agentic_loop::{
    run_agentic_loop, AgentLoopInput, AgentLoopOutput, LoopCallback, LoopConfig, LoopOutcome,
    NoOpCallback, ROUND_LIMIT_MESSAGE,
};
pub use client::{CompletionService, OpenAiClient};
pub use conversation::{upsert_system_message, validate_transcript};
pub use prompts::PromptTemplate;
pub use title::{generate_title, sanitize_title, DEFAULT_TITLE};
pub use types::*;
