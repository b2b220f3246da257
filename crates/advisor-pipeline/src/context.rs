use advisor_core::{Result, StudentContext, StudentId, StudentRecordStore};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Assembles a per-request snapshot of a student's academic record.
///
/// The snapshot is built fresh on every call; completed courses can change
/// between requests, so nothing here is cached.
pub struct ContextBuilder {
    store: Arc<dyn StudentRecordStore>,
}

impl ContextBuilder {
    pub fn new(store: Arc<dyn StudentRecordStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn build(&self, student_id: StudentId) -> Result<StudentContext> {
        let completed = self.store.get_completed_courses(student_id).await?;
        let programs = self.store.get_programs(student_id).await?;

        debug!(
            completed = completed.len(),
            programs = programs.len(),
            "built student context"
        );

        Ok(StudentContext {
            completed_course_codes: completed.into_iter().collect(),
            declared_programs: programs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::{AdvisorError, ProgramRequirement, ProgramType, RequirementItem};
    use async_trait::async_trait;

    struct FakeStore {
        completed: Vec<String>,
        programs: Vec<ProgramRequirement>,
        fail: bool,
    }

    #[async_trait]
    impl StudentRecordStore for FakeStore {
        async fn get_completed_courses(&self, _student_id: StudentId) -> Result<Vec<String>> {
            if self.fail {
                return Err(AdvisorError::RecordStore("store unavailable".to_string()));
            }
            Ok(self.completed.clone())
        }

        async fn get_programs(&self, _student_id: StudentId) -> Result<Vec<ProgramRequirement>> {
            Ok(self.programs.clone())
        }
    }

    #[tokio::test]
    async fn builds_snapshot_from_both_record_calls() {
        let store = Arc::new(FakeStore {
            completed: vec!["CS 210".to_string(), "MATH 251".to_string()],
            programs: vec![ProgramRequirement {
                program_name: "Computer Science".to_string(),
                program_type: ProgramType::Major,
                required_courses: vec![RequirementItem::Code("CS 211".to_string())],
            }],
            fail: false,
        });

        let context = ContextBuilder::new(store).build(7).await.unwrap();

        assert!(context.has_completed("CS 210"));
        assert!(context.has_completed("MATH 251"));
        assert!(!context.has_completed("CS 211"));
        assert_eq!(context.declared_programs.len(), 1);
    }

    #[tokio::test]
    async fn propagates_record_store_failure() {
        let store = Arc::new(FakeStore {
            completed: vec![],
            programs: vec![],
            fail: true,
        });

        let result = ContextBuilder::new(store).build(7).await;
        assert!(result.is_err());
    }
}
