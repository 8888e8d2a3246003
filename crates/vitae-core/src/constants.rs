//! Application-wide constants.

/// Provenance stamped on personas produced by the completion collaborator.
pub const BUILT_BY_AI: &str = "AI";

/// Version of the persona builder conversation and response parser.
/// Bump whenever the prompt or the parsing rules change.
pub const PERSONA_BUILDER_VERSION: &str = "1.0.0";

/// Marker the completion model is instructed to start its reply with when the
/// input text is not a resume.
pub const NOT_A_RESUME: &str = "NOT A RESUME";

/// Channel name for PostgreSQL LISTEN/NOTIFY when a new task is created.
pub const TASK_NOTIFY_CHANNEL: &str = "vitae_new_task";
