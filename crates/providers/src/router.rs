//! Provider selection from configuration.

use std::sync::Arc;
use asploop_config::AppConfig;
use asploop_core::provider::Provider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the chat provider described by `config`.
///
/// Every supported backend speaks the OpenAI wire format; the provider kind
/// only picks a default URL when `base_url` is left empty.
pub fn build_from_config(config: &AppConfig) -> Arc<dyn Provider> {
    let base_url = if config.base_url.trim().is_empty() {
        default_base_url(&config.provider)
    } else {
        config.base_url.clone()
    };

    tracing::debug!(provider = %config.provider, base_url = %base_url, "Building provider");

    Arc::new(OpenAiCompatProvider::new(
        config.provider.clone(),
        base_url,
        config.effective_api_key(),
    ))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => "http://localhost:11434/v1".into(),
    }
}
