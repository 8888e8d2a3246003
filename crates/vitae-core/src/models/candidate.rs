use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::persona::Persona;

/// A candidate profile owned by a team.
///
/// Candidates produced by the pipeline carry the AI generated persona and the id of
/// the upload they were built from; a team member may later attach a manually
/// curated persona alongside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateRecord {
    pub id: String,
    pub team_id: String,
    pub file_upload_id: Option<String>,
    pub ai_generated_persona: Option<Persona>,
    pub manually_created_persona: Option<Persona>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for CandidateRecord {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::types::Json;
        use sqlx::Row;
        Ok(CandidateRecord {
            id: row.try_get("id")?,
            team_id: row.try_get("team_id")?,
            file_upload_id: row.try_get("file_upload_id")?,
            ai_generated_persona: row
                .try_get::<Option<Json<Persona>>, _>("ai_generated_persona")?
                .map(|json| json.0),
            manually_created_persona: row
                .try_get::<Option<Json<Persona>>, _>("manually_created_persona")?
                .map(|json| json.0),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl CandidateRecord {
    /// The persona to present: a manual curation wins over the AI snapshot.
    pub fn effective_persona(&self) -> Option<&Persona> {
        self.manually_created_persona
            .as_ref()
            .filter(|p| p.is_valid())
            .or(self.ai_generated_persona.as_ref().filter(|p| p.is_valid()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona(name: &str) -> Persona {
        Persona {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_effective_persona_prefers_manual() {
        let mut candidate = CandidateRecord {
            id: "c1".to_string(),
            team_id: "t1".to_string(),
            file_upload_id: Some("fp1".to_string()),
            ai_generated_persona: Some(persona("From AI")),
            manually_created_persona: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(candidate.effective_persona().unwrap().name, "From AI");

        candidate.manually_created_persona = Some(persona(""));
        assert_eq!(candidate.effective_persona().unwrap().name, "From AI");

        candidate.manually_created_persona = Some(persona("Curated"));
        assert_eq!(candidate.effective_persona().unwrap().name, "Curated");
    }
}
