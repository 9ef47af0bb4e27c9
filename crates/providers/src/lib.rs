//! Model service implementations for sidekick.
//!
//! The agent never talks to a model directly. It goes through
//! `sidekick_core::ModelClient`, which wraps one of these services.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatModel;
