//! Completion provider implementations for Juliet.
//!
//! All providers implement the `juliet_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
