//! Provider client implementations for Confab.
//!
//! One implementation of the `confab_core::Provider` trait: an
//! OpenAI-compatible chat completions client. Works with OpenAI itself and
//! with anything speaking the same dialect (vLLM, Ollama, proxies), selected
//! by `base_url` in the provider configuration.

pub mod openai;

pub use openai::OpenAiProvider;
