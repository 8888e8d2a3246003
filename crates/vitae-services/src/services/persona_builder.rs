//! Persona builder
//!
//! Builds the resume-analysis conversation, sends it through a [`CompletionClient`] and
//! turns the reply into a [`Persona`] stamped with the builder version.

use std::sync::Arc;
use vitae_core::constants::NOT_A_RESUME;
use vitae_core::models::Persona;
use vitae_core::PipelineError;

use super::completion::{ChatMessage, CompletionClient};

const PERSONA_ATTRIBUTES_INSTRUCTION: &str = "Given the above resume, please build a persona in JSON with the following attributes (return empty if data is unavailable). Name, Email, Phone, City, State, Country, Years of experience as \"YoE\" (type int), Top 5 technical skills present in this profile as \"Tech Skills\" (type array of string), Top 5 soft skills present in this profile as \"Soft Skills\" (type array of string), Top 3 recommended job positions as \"Recommended Roles\" (type array of string), Certifications (type array of string), Institutes attended as \"Education\" (type array) including \"Institute\", \"Qualification\" and \"CompletionYear\" (type string), Jobs held as \"Experience\" (type array) including \"Title\", \"Company Name\", \"Starting Year\" (type string), \"Ending Year\" (type string), \"Ongoing\" (type boolean). Respond with the JSON object only.";

#[derive(Clone)]
pub struct PersonaBuilder {
    client: Arc<dyn CompletionClient>,
}

impl PersonaBuilder {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Build a persona from resume text.
    ///
    /// A reply flagging the text as not a resume is [`PipelineError::NotAResume`]; a reply
    /// that is not a persona JSON object is [`PipelineError::Completion`].
    pub async fn build(&self, resume_text: &str) -> Result<Persona, PipelineError> {
        let response = self.client.complete(&resume_messages(resume_text)).await?;
        parse_persona_response(&response)
    }
}

/// The conversation sent for one resume.
pub fn resume_messages(resume_text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!(
            "You are Resume analyser. You read a resume and build a persona based on the given criteria. If the provided resume does not seem like a resume, your response should start with \"{}\"",
            NOT_A_RESUME
        )),
        ChatMessage::assistant("Please share your resume."),
        ChatMessage::user(resume_text),
        ChatMessage::user(PERSONA_ATTRIBUTES_INSTRUCTION),
    ]
}

/// Parse a completion reply into a stamped persona.
pub fn parse_persona_response(response: &str) -> Result<Persona, PipelineError> {
    if response.contains(NOT_A_RESUME) {
        return Err(PipelineError::NotAResume);
    }

    let mut persona: Persona = serde_json::from_str(strip_code_fences(response)).map_err(|e| {
        tracing::warn!(error = %e, response_len = response.len(), "Unparseable persona response");
        PipelineError::Completion(format!("unable to parse response: {}", e))
    })?;
    persona.stamp_builder();

    Ok(persona)
}

/// Models sometimes wrap JSON in a Markdown code block.
fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
