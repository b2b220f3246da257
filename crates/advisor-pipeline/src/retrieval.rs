use advisor_core::{Availability, CandidateCourse, CourseDocument, CourseIndex, Schedule, SearchPlan};
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Metadata fields probed, in priority order, when deriving a candidate's
/// identity. The index does not guarantee the primary key is populated, so a
/// key derived only from `course_code` would silently admit duplicates.
const KEY_FIELDS: [&str; 4] = ["course_code", "id", "title", "name"];

/// Fans a search plan out across a bounded worker pool, merges results in
/// completion order, and drops exact-key duplicates.
pub struct RetrievalEngine {
    index: Arc<dyn CourseIndex>,
    width: usize,
    top_k: usize,
    timeout: Duration,
}

impl RetrievalEngine {
    pub fn new(index: Arc<dyn CourseIndex>, width: usize, top_k: usize, timeout: Duration) -> Self {
        Self {
            index,
            width,
            top_k,
            timeout,
        }
    }

    #[instrument(skip(self, plan), fields(queries = plan.len()))]
    pub async fn retrieve(&self, plan: &SearchPlan) -> Vec<CandidateCourse> {
        let width = plan.len().min(self.width).max(1);

        // One bad query must not blank the whole recommendation: each search
        // degrades to an empty partial on failure.
        let batches: Vec<Vec<CourseDocument>> = stream::iter(plan.queries.iter().cloned())
            .map(|query| {
                let index = Arc::clone(&self.index);
                let top_k = self.top_k;
                let timeout = self.timeout;
                async move {
                    match tokio::time::timeout(timeout, index.search(&query, top_k)).await {
                        Ok(Ok(documents)) => documents,
                        Ok(Err(e)) => {
                            warn!("search '{query}' failed: {e}");
                            Vec::new()
                        }
                        Err(_) => {
                            warn!("search '{query}' timed out");
                            Vec::new()
                        }
                    }
                }
            })
            .buffer_unordered(width)
            .collect()
            .await;

        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();

        for document in batches.into_iter().flatten() {
            let key = dedup_key(&document);
            if !seen.insert(key.clone()) {
                continue;
            }
            candidates.push(candidate_from_document(&document, key));
        }

        debug!(candidates = candidates.len(), "retrieval merged");
        candidates
    }
}

/// Deduplication key for a retrieved document; first non-empty accessor wins,
/// with a content hash as the last resort.
pub fn dedup_key(document: &CourseDocument) -> String {
    for field in KEY_FIELDS {
        if let Some(value) = document.field(field) {
            return value.to_string();
        }
    }

    if let Some(description) = document.field("description") {
        return description.chars().take(50).collect();
    }

    let prefix: String = document.content.chars().take(100).collect();
    let digest = Sha256::digest(prefix.as_bytes());
    format!("content-{:x}", digest)[..23].to_string()
}

/// Lifts a raw index document into a typed candidate. A document with no
/// usable course code gets the (synthetic but stable) dedup key as its code,
/// so verification never sees an empty key.
fn candidate_from_document(document: &CourseDocument, key: String) -> CandidateCourse {
    let field = |name: &str| document.field(name).unwrap_or("").to_string();

    let course_code = match document.field("course_code") {
        Some(code) => code.to_string(),
        None => key,
    };

    CandidateCourse {
        course_code,
        course_name: document
            .field("course_name")
            .or_else(|| document.field("title"))
            .or_else(|| document.field("name"))
            .unwrap_or("")
            .to_string(),
        credit_hours: document.field("credit_hours").map(str::to_string),
        description: field("description"),
        prerequisites: field("prerequisites"),
        instructor: field("instructor"),
        schedule: Schedule {
            days: document.field("days").map(str::to_string),
            time: document.field("time").map(str::to_string),
        },
        location: field("classroom"),
        availability: Availability {
            available_seats: document.field("available_seats").map(str::to_string),
            total_seats: document.field("total_seats").map(str::to_string),
        },
    }
}
