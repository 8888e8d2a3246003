//! Vitae Services Layer
//!
//! Domain services the worker pipeline calls between claim and finalize: text
//! extraction from the uploaded bytes, the AI completion client, and the persona
//! builder that turns resume text into a [`vitae_core::models::Persona`].

pub mod services;

#[cfg(feature = "openai")]
pub use services::openai::OpenAiClient;
#[cfg(feature = "document")]
pub use services::text_extractor::PdfTextExtractor;
pub use services::{
    completion::{filter_supported_messages, ChatMessage, ChatRole, CompletionClient},
    persona_builder::{parse_persona_response, PersonaBuilder},
    text_extractor::TextExtractor,
};
