use crate::pipeline::RecommendationPipeline;
use advisor_core::{RecommendationResult, StudentId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Per-student slot holding the most recent background request. One slot per
/// student; a new submission replaces whatever the slot held.
#[derive(Debug, Clone)]
enum SlotState {
    Pending {
        request_id: Uuid,
        submitted_at: DateTime<Utc>,
    },
    Ready {
        request_id: Uuid,
        result: RecommendationResult,
    },
}

/// Poll answer: either the work is still running, or the finished result.
#[derive(Debug, Clone, Serialize)]
pub struct PollResponse {
    pub pending: bool,
    pub result: Option<RecommendationResult>,
}

/// Fire-and-poll front for the pipeline. Callers submit a request, get a
/// request id back immediately, and poll for the result later. Results are
/// consumed on read.
pub struct BackgroundAdvisor {
    pipeline: Arc<RecommendationPipeline>,
    slots: Arc<DashMap<StudentId, SlotState>>,
}

impl BackgroundAdvisor {
    pub fn new(pipeline: Arc<RecommendationPipeline>) -> Self {
        Self {
            pipeline,
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Starts a recommendation run for the student and returns its request
    /// id. A second submission for the same student replaces the first; the
    /// superseded run still finishes but its result is dropped.
    #[instrument(skip(self, query))]
    pub fn submit(&self, student_id: StudentId, query: Option<String>) -> Uuid {
        let request_id = Uuid::new_v4();
        let previous = self.slots.insert(
            student_id,
            SlotState::Pending {
                request_id,
                submitted_at: Utc::now(),
            },
        );
        match previous {
            Some(SlotState::Pending {
                request_id: superseded,
                submitted_at,
            }) => {
                let waited_secs = (Utc::now() - submitted_at).num_seconds();
                warn!(
                    student_id,
                    %superseded,
                    replacement = %request_id,
                    waited_secs,
                    "replacing an in-flight background request"
                );
            }
            Some(SlotState::Ready {
                request_id: superseded,
                ..
            }) => {
                warn!(
                    student_id,
                    %superseded,
                    replacement = %request_id,
                    "discarding an unread background result"
                );
            }
            None => {}
        }

        let pipeline = self.pipeline.clone();
        let slots = self.slots.clone();
        tokio::spawn(async move {
            let result = pipeline
                .get_recommendations(student_id, query.as_deref())
                .await;

            // Only land the result if this request still owns the slot.
            match slots.get_mut(&student_id) {
                Some(mut slot)
                    if matches!(
                        *slot,
                        SlotState::Pending { request_id: current, .. } if current == request_id
                    ) =>
                {
                    *slot = SlotState::Ready { request_id, result };
                }
                _ => {
                    warn!(student_id, %request_id, "request superseded; dropping result");
                }
            }
        });

        request_id
    }

    /// Returns the finished result if one is waiting, removing it from the
    /// slot. While the run is in flight this reports pending.
    #[instrument(skip(self))]
    pub fn poll(&self, student_id: StudentId) -> PollResponse {
        let is_ready = matches!(
            self.slots.get(&student_id).as_deref(),
            Some(SlotState::Ready { .. })
        );

        if is_ready {
            if let Some((_, SlotState::Ready { request_id, result })) =
                self.slots.remove(&student_id)
            {
                debug!(student_id, %request_id, "delivering background result");
                return PollResponse {
                    pending: false,
                    result: Some(result),
                };
            }
        }

        let pending = self.slots.contains_key(&student_id);
        PollResponse {
            pending,
            result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ModelSet;
    use crate::testing::{FakeRecordStore, ScriptedIndex, ScriptedLlm};
    use advisor_core::{PipelineConfig, ResultKind};
    use std::time::Duration;

    fn advisor(llm: ScriptedLlm) -> BackgroundAdvisor {
        let pipeline = RecommendationPipeline::new(
            PipelineConfig::default(),
            Arc::new(FakeRecordStore::new(["CS 210"])),
            Arc::new(ScriptedIndex::with_documents(Vec::new())),
            ModelSet::shared(Arc::new(llm)),
        );
        BackgroundAdvisor::new(Arc::new(pipeline))
    }

    async fn poll_until_ready(advisor: &BackgroundAdvisor, student_id: StudentId) -> PollResponse {
        for _ in 0..50 {
            let response = advisor.poll(student_id);
            if response.result.is_some() {
                return response;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("background request never finished");
    }

    #[tokio::test]
    async fn submit_then_poll_consumes_the_result() {
        let advisor = advisor(ScriptedLlm::replies([
            "GENERAL",
            "Happy to chat about your studies!",
        ]));

        advisor.submit(7, Some("hello".to_string()));
        let response = poll_until_ready(&advisor, 7).await;
        let result = response.result.unwrap();
        assert_eq!(result.kind, ResultKind::GeneralResponse);

        // Consumed on read: the slot is now empty.
        let empty = advisor.poll(7);
        assert!(!empty.pending);
        assert!(empty.result.is_none());
    }

    #[tokio::test]
    async fn poll_for_unknown_student_is_not_pending() {
        let advisor = advisor(ScriptedLlm::replies(["unused"]));
        let response = advisor.poll(999);
        assert!(!response.pending);
        assert!(response.result.is_none());
    }

    #[tokio::test]
    async fn resubmission_supersedes_the_earlier_request() {
        let advisor = advisor(ScriptedLlm::replies([
            "GENERAL",
            "First answer.",
            "GENERAL",
            "Second answer.",
        ]));

        let first = advisor.submit(7, Some("hello".to_string()));
        let second = advisor.submit(7, Some("hello again".to_string()));
        assert_ne!(first, second);

        // Whichever run finishes, only the second request's slot survives.
        let response = poll_until_ready(&advisor, 7).await;
        assert!(response.result.is_some());
    }
}
