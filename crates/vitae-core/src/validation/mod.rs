//! Validation helpers shared by repositories and the pipeline.
//!
//! Validation runs before any I/O so that input which cannot possibly succeed never
//! opens a transaction or reaches an external collaborator.

use crate::error::PipelineError;

/// True when the value is empty or only whitespace.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Reject a blank value with a validation error naming the field.
pub fn require_non_blank(field: &str, value: &str) -> Result<(), PipelineError> {
    if is_blank(value) {
        return Err(PipelineError::Validation(format!(
            "{} cannot be blank",
            field
        )));
    }
    Ok(())
}

/// True when `value` can be used as one segment of an object key: no path
/// separators, and not `.` or `..` on its own. Dots inside a name are fine.
pub fn is_safe_path_segment(value: &str) -> bool {
    !value.contains('/') && !value.contains('\\') && value != "." && value != ".."
}

/// Reject a blank value or one that is not a single path segment.
pub fn require_path_segment(field: &str, value: &str) -> Result<(), PipelineError> {
    require_non_blank(field, value)?;
    if !is_safe_path_segment(value) {
        return Err(PipelineError::Validation(format!(
            "{} contains invalid characters: {}",
            field, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank("   "));
        assert!(is_blank("\t\n"));
        assert!(!is_blank(" a "));
    }

    #[test]
    fn test_require_non_blank_names_field() {
        let err = require_non_blank("fileUploadId", " ").unwrap_err();
        assert_eq!(err.to_string(), "fileUploadId cannot be blank");
        assert!(require_non_blank("fileUploadId", "fp1").is_ok());
    }

    #[test]
    fn test_path_segment_allows_inner_dots() {
        assert!(require_path_segment("name", "John..Doe CV.pdf").is_ok());
        assert!(require_path_segment("name", ".resume.pdf").is_ok());
        assert!(require_path_segment("name", "resume.v2.pdf").is_ok());
    }

    #[test]
    fn test_path_segment_rejects_separators_and_dot_segments() {
        for bad in ["..", ".", "a/b.pdf", "..\\x.pdf", "../up.pdf"] {
            let err = require_path_segment("name", bad).unwrap_err();
            assert!(matches!(err, PipelineError::Validation(_)), "{}", bad);
        }
        assert!(matches!(
            require_path_segment("name", " ").unwrap_err(),
            PipelineError::Validation(_)
        ));
    }
}
