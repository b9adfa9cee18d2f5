//! # inquest-llm-openai
//!
//! [`Provider`](inquest_llm::Provider) backend for OpenAI-compatible chat
//! completions endpoints (`/v1/chat/completions`). Works against OpenAI
//! itself and against compatible self-hosted gateways; the endpoint is
//! configured with a base URL and bearer API key.
//!
//! The backend is non-streaming: one request yields one full assistant
//! turn, which is all the investigation loop consumes.

#![deny(unsafe_code)]

pub mod convert;
pub mod provider;
pub mod types;

pub use provider::OpenAiProvider;
pub use types::{OpenAiConfig, DEFAULT_BASE_URL};
