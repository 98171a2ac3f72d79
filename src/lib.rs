#![deny(missing_docs)]
//! Multimodal Slack bot.
//!
//! Relays Slack conversations to an OpenAI-compatible model and routes the
//! model's tool calls to image generation, text-to-speech and speech-to-text.

/// Slack transport, conversation assembly and tool dispatch.
pub mod bot;
/// Configuration management.
pub mod config;
/// LLM providers and tool declarations.
pub mod llm;
/// Temporary media staging.
pub mod media;
/// Utility functions.
pub mod utils;

#[cfg(test)]
pub mod testing;
