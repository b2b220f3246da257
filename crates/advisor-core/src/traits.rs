use crate::{CourseDocument, ProgramRequirement, Result, StudentId};
use async_trait::async_trait;

/// Read-only view of the student record store.
#[async_trait]
pub trait StudentRecordStore: Send + Sync {
    async fn get_completed_courses(&self, student_id: StudentId) -> Result<Vec<String>>;
    async fn get_programs(&self, student_id: StudentId) -> Result<Vec<ProgramRequirement>>;
}

/// Similarity search over the course catalog. Ordering is not stable across
/// identical queries and no particular metadata field is guaranteed present.
#[async_trait]
pub trait CourseIndex: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<CourseDocument>>;
}
