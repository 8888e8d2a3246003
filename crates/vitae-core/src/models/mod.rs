pub mod candidate;
pub mod persona;
pub mod task;
pub mod upload;

pub use candidate::CandidateRecord;
pub use persona::{Education, Experience, Persona};
pub use task::{ProcessFileUploadPayload, Task, TaskPayload, TaskStatus, TaskType};
pub use upload::{ProcessingStatus, ProcessingTransition, UploadRecord, UploadStatus};
