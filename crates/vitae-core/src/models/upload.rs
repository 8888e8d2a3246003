use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Whether the raw bytes of an upload have arrived.
///
/// Persisted as `INITIATED`, `SUCCESS`, `FAILURE`. SUCCESS and FAILURE are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Initiated,
    Success,
    Failure,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Initiated => "INITIATED",
            UploadStatus::Success => "SUCCESS",
            UploadStatus::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Success | UploadStatus::Failure)
    }
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIATED" => Ok(UploadStatus::Initiated),
            "SUCCESS" => Ok(UploadStatus::Success),
            "FAILURE" => Ok(UploadStatus::Failure),
            _ => Err(anyhow::anyhow!("Invalid upload status: {}", s)),
        }
    }
}

/// Progress of the AI pipeline for an upload.
///
/// Persisted as `NOT STARTED`, `ONGOING`, `COMPLETED`, `FAILED`. The only legal
/// moves are NOT STARTED -> ONGOING -> {COMPLETED, FAILED}.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProcessingStatus {
    #[serde(rename = "NOT STARTED")]
    NotStarted,
    #[serde(rename = "ONGOING")]
    Ongoing,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::NotStarted => "NOT STARTED",
            ProcessingStatus::Ongoing => "ONGOING",
            ProcessingStatus::Completed => "COMPLETED",
            ProcessingStatus::Failed => "FAILED",
        }
    }

    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        matches!(
            (self, next),
            (ProcessingStatus::NotStarted, ProcessingStatus::Ongoing)
                | (ProcessingStatus::Ongoing, ProcessingStatus::Completed)
                | (ProcessingStatus::Ongoing, ProcessingStatus::Failed)
        )
    }

    /// COMPLETED and FAILED are never left; FAILED uploads are not retried automatically.
    pub fn is_finished(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

impl Display for ProcessingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT STARTED" => Ok(ProcessingStatus::NotStarted),
            "ONGOING" => Ok(ProcessingStatus::Ongoing),
            "COMPLETED" => Ok(ProcessingStatus::Completed),
            "FAILED" => Ok(ProcessingStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid processing status: {}", s)),
        }
    }
}

/// A legal edge of the processing state machine.
///
/// The only way to build one is [`ProcessingTransition::between`] or the named
/// constants, so a store primitive taking a transition can never be asked to
/// perform an illegal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingTransition {
    from: ProcessingStatus,
    to: ProcessingStatus,
}

impl ProcessingTransition {
    pub const CLAIM: ProcessingTransition = ProcessingTransition {
        from: ProcessingStatus::NotStarted,
        to: ProcessingStatus::Ongoing,
    };
    pub const COMPLETE: ProcessingTransition = ProcessingTransition {
        from: ProcessingStatus::Ongoing,
        to: ProcessingStatus::Completed,
    };
    pub const FAIL: ProcessingTransition = ProcessingTransition {
        from: ProcessingStatus::Ongoing,
        to: ProcessingStatus::Failed,
    };

    pub fn between(from: ProcessingStatus, to: ProcessingStatus) -> Option<Self> {
        from.can_transition_to(to)
            .then_some(ProcessingTransition { from, to })
    }

    pub fn from(&self) -> ProcessingStatus {
        self.from
    }

    pub fn to(&self) -> ProcessingStatus {
        self.to
    }
}

impl Display for ProcessingTransition {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Durable lifecycle state of one file upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadRecord {
    pub id: String,
    pub name: String,
    pub object_location: String,
    pub upload_status: UploadStatus,
    pub processing_status: ProcessingStatus,
    pub team_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for UploadRecord {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(UploadRecord {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            object_location: row.try_get("object_location")?,
            upload_status: row.try_get::<String, _>("status")?.parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse status: {}", e).into())
            })?,
            processing_status: row
                .try_get::<String, _>("processing_status")?
                .parse()
                .map_err(|e| {
                    sqlx::Error::Decode(format!("Failed to parse processing_status: {}", e).into())
                })?,
            team_id: row.try_get("team_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl UploadRecord {
    /// Only records whose bytes have arrived and whose processing has not begun may be claimed.
    pub fn is_eligible_for_processing(&self) -> bool {
        self.upload_status == UploadStatus::Success
            && self.processing_status == ProcessingStatus::NotStarted
    }

    pub fn belongs_to_team(&self, team_id: &str) -> bool {
        self.team_id == team_id
    }
}
