pub mod completion;
#[cfg(feature = "openai")]
pub mod openai;
pub mod persona_builder;
pub mod text_extractor;
