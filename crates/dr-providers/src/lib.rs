//! dr-providers: LLM provider implementations for deep-researcher
//!
//! This crate provides implementations of the `Provider` trait for the
//! completion services the research pipeline talks to.

pub mod gemini;

pub use gemini::{GeminiProvider, DEFAULT_GEMINI_MODEL};
