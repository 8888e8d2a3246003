//! Shared key generation for storage backends.
//!
//! Key format: `{team_id}/{upload_id}/{file_name}`.

use crate::traits::{StorageError, StorageResult};
use vitae_core::validation::is_safe_path_segment;

fn check_segment(label: &str, segment: &str) -> StorageResult<()> {
    if segment.trim().is_empty() {
        return Err(StorageError::InvalidKey(format!("{} cannot be blank", label)));
    }
    if !is_safe_path_segment(segment) {
        return Err(StorageError::InvalidKey(format!(
            "{} contains invalid characters: {}",
            label, segment
        )));
    }
    Ok(())
}

/// Build the object key for an upload. Every segment must be non-blank and free of
/// path separators so a key can never escape its team prefix.
pub fn object_key(team_id: &str, upload_id: &str, file_name: &str) -> StorageResult<String> {
    check_segment("team_id", team_id)?;
    check_segment("upload_id", upload_id)?;
    check_segment("file_name", file_name)?;
    Ok(format!("{}/{}/{}", team_id, upload_id, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_layout() {
        assert_eq!(
            object_key("team-1", "fp1", "resume.pdf").unwrap(),
            "team-1/fp1/resume.pdf"
        );
        assert_eq!(
            object_key("team-1", "fp1", "My Resume (1).pdf").unwrap(),
            "team-1/fp1/My Resume (1).pdf"
        );
    }

    #[test]
    fn test_object_key_rejects_traversal() {
        assert!(object_key("team-1", "fp1", "../other/resume.pdf").is_err());
        assert!(object_key("team-1/..", "fp1", "resume.pdf").is_err());
        assert!(object_key("team-1", "fp1", "a/b.pdf").is_err());
        assert!(object_key("team-1", "fp1", "..").is_err());
    }

    #[test]
    fn test_object_key_allows_dots_inside_names() {
        assert_eq!(
            object_key("team-1", "fp1", "John..Doe CV.pdf").unwrap(),
            "team-1/fp1/John..Doe CV.pdf"
        );
    }

    #[test]
    fn test_object_key_rejects_blank_segments() {
        assert!(object_key("", "fp1", "resume.pdf").is_err());
        assert!(object_key("team-1", " ", "resume.pdf").is_err());
        assert!(object_key("team-1", "fp1", "").is_err());
    }
}
