//! Persona: the structured candidate profile built from a resume.
//!
//! Field names on the wire are the attribute names the completion model is asked to
//! produce ("Tech Skills", "YoE", ...). Missing or `null` attributes decode to their
//! defaults so that a sparse but well-formed response still yields a persona.

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{BUILT_BY_AI, PERSONA_BUILDER_VERSION};
use crate::error::PipelineError;
use crate::validation::is_blank;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Education {
    #[serde(rename = "Institute", default, deserialize_with = "null_as_default")]
    pub institute: String,
    #[serde(rename = "Qualification", default, deserialize_with = "null_as_default")]
    pub qualification: String,
    #[serde(rename = "CompletionYear", default, deserialize_with = "null_as_default")]
    pub completion_year: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Experience {
    #[serde(rename = "Title", default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "Company Name", default, deserialize_with = "null_as_default")]
    pub company_name: String,
    #[serde(rename = "Starting Year", default, deserialize_with = "null_as_default")]
    pub starting_year: String,
    #[serde(rename = "Ending Year", default, deserialize_with = "null_as_default")]
    pub ending_year: String,
    #[serde(rename = "Ongoing", default, deserialize_with = "null_as_default")]
    pub ongoing: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Persona {
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "Email", default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(rename = "Phone", default, deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(rename = "City", default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(rename = "State", default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(rename = "Country", default, deserialize_with = "null_as_default")]
    pub country: String,
    #[serde(rename = "YoE", default, deserialize_with = "null_as_default")]
    pub years_of_experience: i32,
    #[serde(rename = "Tech Skills", default, deserialize_with = "null_as_default")]
    pub tech_skills: Vec<String>,
    #[serde(rename = "Soft Skills", default, deserialize_with = "null_as_default")]
    pub soft_skills: Vec<String>,
    #[serde(rename = "Recommended Roles", default, deserialize_with = "null_as_default")]
    pub recommended_roles: Vec<String>,
    #[serde(rename = "Education", default, deserialize_with = "null_as_default")]
    pub education: Vec<Education>,
    #[serde(rename = "Experience", default, deserialize_with = "null_as_default")]
    pub experience: Vec<Experience>,
    #[serde(rename = "Certifications", default, deserialize_with = "null_as_default")]
    pub certifications: Vec<String>,
    #[serde(rename = "BuilderVersion", default, deserialize_with = "null_as_default")]
    pub builder_version: String,
    #[serde(rename = "BuiltBy", default, deserialize_with = "null_as_default")]
    pub built_by: String,
    #[serde(rename = "FileUploadId", default, deserialize_with = "null_as_default")]
    pub file_upload_id: String,
}

impl Persona {
    /// A persona is usable when it names someone.
    pub fn is_valid(&self) -> bool {
        !is_blank(&self.name)
    }

    pub fn is_ai_generated(&self) -> bool {
        self.built_by == BUILT_BY_AI
    }

    /// Record which builder produced this persona.
    pub fn stamp_builder(&mut self) {
        self.builder_version = PERSONA_BUILDER_VERSION.to_string();
        self.built_by = BUILT_BY_AI.to_string();
    }

    /// Link the persona to the upload it was built from.
    pub fn stamp_file_upload(&mut self, file_upload_id: &str) {
        self.file_upload_id = file_upload_id.to_string();
        self.built_by = BUILT_BY_AI.to_string();
    }

    /// Minimal validity check run before any transaction is opened.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.is_valid() {
            return Err(PipelineError::InvalidPersona(
                "persona name cannot be blank".to_string(),
            ));
        }
        if self.is_ai_generated() && is_blank(&self.file_upload_id) {
            return Err(PipelineError::InvalidPersona(
                "AI generated persona must reference a file upload".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_model_response() {
        let json = r#"{
            "Name": "Ada Lovelace",
            "Email": "ada@example.com",
            "Phone": "",
            "City": "London",
            "State": null,
            "Country": "UK",
            "YoE": 12,
            "Tech Skills": ["Analytical Engines", "Mathematics"],
            "Soft Skills": ["Writing"],
            "Recommended Roles": ["Programmer"],
            "Education": [{"Institute": "Home", "Qualification": "Tutoring", "CompletionYear": "1835"}],
            "Experience": [{"Title": "Analyst", "Company Name": "Babbage", "Starting Year": "1842", "Ending Year": "1843", "Ongoing": false}],
            "Certifications": null
        }"#;

        let persona: Persona = serde_json::from_str(json).unwrap();
        assert_eq!(persona.name, "Ada Lovelace");
        assert_eq!(persona.years_of_experience, 12);
        assert_eq!(persona.state, "");
        assert!(persona.certifications.is_empty());
        assert_eq!(persona.education[0].completion_year, "1835");
        assert_eq!(persona.experience[0].company_name, "Babbage");
        assert!(!persona.experience[0].ongoing);
        assert!(persona.built_by.is_empty());
    }

    #[test]
    fn test_missing_attributes_default() {
        let persona: Persona = serde_json::from_str(r#"{"Name": "X"}"#).unwrap();
        assert!(persona.is_valid());
        assert_eq!(persona.years_of_experience, 0);
        assert!(persona.tech_skills.is_empty());
    }

    #[test]
    fn test_blank_name_is_invalid() {
        let persona = Persona {
            name: "   ".to_string(),
            ..Default::default()
        };
        assert!(!persona.is_valid());
        assert!(matches!(
            persona.validate(),
            Err(PipelineError::InvalidPersona(_))
        ));
    }

    #[test]
    fn test_ai_persona_requires_file_upload_id() {
        let mut persona = Persona {
            name: "X".to_string(),
            ..Default::default()
        };
        persona.stamp_builder();
        assert!(persona.validate().is_err());

        persona.stamp_file_upload("fp1");
        assert!(persona.validate().is_ok());
        assert_eq!(persona.built_by, "AI");
        assert_eq!(persona.builder_version, "1.0.0");
    }

    #[test]
    fn test_manual_persona_without_upload_is_valid() {
        let persona = Persona {
            name: "Grace".to_string(),
            ..Default::default()
        };
        assert!(persona.validate().is_ok());
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let mut persona = Persona {
            name: "X".to_string(),
            tech_skills: vec!["Rust".to_string()],
            ..Default::default()
        };
        persona.stamp_file_upload("fp1");
        let value = serde_json::to_value(&persona).unwrap();
        assert_eq!(value["Name"], "X");
        assert_eq!(value["Tech Skills"][0], "Rust");
        assert_eq!(value["FileUploadId"], "fp1");
        assert_eq!(value["BuiltBy"], "AI");
    }
}
