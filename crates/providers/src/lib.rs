//! LLM Provider implementations for asploop.
//!
//! All providers implement the `asploop_core::Provider` trait.
//! [`build_from_config`] selects the provider from configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
