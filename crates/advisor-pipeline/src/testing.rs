//! Scripted in-memory collaborators for tests. No stage talks to a live
//! service in unit or integration tests; these doubles script the external
//! contracts instead.

use advisor_ai::{GenerationConfig, LlmProvider, LlmResponse, LlmResult, Message};
use advisor_core::{
    AdvisorError, CourseDocument, CourseIndex, ProgramRequirement, Result, StudentId,
    StudentRecordStore,
};
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// [`LlmProvider`] that replays a queue of canned outcomes in call order.
pub struct ScriptedLlm {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
}

impl ScriptedLlm {
    pub fn new(
        script: impl IntoIterator<Item = std::result::Result<String, String>>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }

    /// Every call succeeds with the next reply; the last reply repeats.
    pub fn replies<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self::new(replies.into_iter().map(|r| Ok(r.into())))
    }

    /// Every call fails with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::from([Err(message.into())])),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate_chat(
        &self,
        _messages: &[Message],
        _config: &GenerationConfig,
    ) -> LlmResult<LlmResponse> {
        let mut script = self.script.lock().unwrap();
        let outcome = if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            // Keep the final entry so late callers see a stable outcome.
            script.front().cloned().unwrap_or(Err("script exhausted".to_string()))
        };

        match outcome {
            Ok(content) => Ok(LlmResponse {
                content,
                total_tokens: None,
                prompt_tokens: None,
                completion_tokens: None,
                finish_reason: Some("stop".to_string()),
                model: "scripted".to_string(),
            }),
            Err(message) => Err(anyhow!(message)),
        }
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// [`CourseIndex`] returning the same documents for every query, or an error.
pub struct ScriptedIndex {
    documents: Vec<CourseDocument>,
    fail: bool,
}

impl ScriptedIndex {
    pub fn with_documents(documents: Vec<CourseDocument>) -> Self {
        Self {
            documents,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            documents: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl CourseIndex for ScriptedIndex {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<CourseDocument>> {
        if self.fail {
            return Err(AdvisorError::Index("index unreachable".to_string()));
        }
        Ok(self.documents.iter().take(k).cloned().collect())
    }
}

/// In-memory [`StudentRecordStore`].
pub struct FakeRecordStore {
    pub completed: Vec<String>,
    pub programs: Vec<ProgramRequirement>,
    pub fail: bool,
}

impl FakeRecordStore {
    pub fn new(completed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            completed: completed.into_iter().map(Into::into).collect(),
            programs: Vec::new(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            completed: Vec::new(),
            programs: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl StudentRecordStore for FakeRecordStore {
    async fn get_completed_courses(&self, _student_id: StudentId) -> Result<Vec<String>> {
        if self.fail {
            return Err(AdvisorError::RecordStore("store unavailable".to_string()));
        }
        Ok(self.completed.clone())
    }

    async fn get_programs(&self, _student_id: StudentId) -> Result<Vec<ProgramRequirement>> {
        if self.fail {
            return Err(AdvisorError::RecordStore("store unavailable".to_string()));
        }
        Ok(self.programs.clone())
    }
}

/// Convenience builder for a candidate-course document in index metadata form.
pub fn course_document(code: &str, fields: &[(&str, &str)]) -> CourseDocument {
    let mut metadata: std::collections::HashMap<String, String> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    if !code.is_empty() {
        metadata.insert("course_code".to_string(), code.to_string());
    }
    let description = metadata.get("description").cloned().unwrap_or_default();
    CourseDocument {
        content: format!("Course: {code}\nDescription: {description}"),
        metadata,
    }
}
