use advisor_ai::LlmProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const INTENT_PROMPT: &str = r#"You are an academic advising system assistant analyzing student queries to determine what they need help with.

Student query: {query}

Classify this query into ONE of these categories:
- COURSE: Any query related to course recommendations, prerequisites, scheduling, degree requirements, or specific course information.
- GENERAL: Only purely conversational exchanges with NO academic content whatsoever.

CRITICAL GUIDANCE:
- If a student mentions courses they've taken and is asking about what to take next, this is COURSE.
- If a query begins with a greeting but includes academic questions, this is COURSE, not GENERAL.
- When a student mentions specific course codes (like CS 212, MATH 252) and asks about future courses, this is COURSE.
- Only use GENERAL for pure greetings, thanks, or casual conversations with zero academic content.
- When in doubt between COURSE and GENERAL, choose COURSE.

Respond with exactly one word: either COURSE or GENERAL."#;

const GENERAL_PROMPT: &str = r#"You are a friendly academic advisor chatbot. The student has asked a general question (not specifically about courses).
Respond in a friendly, helpful way. Keep your response concise and natural.

If appropriate, suggest that they can ask about their program requirements or what courses to take next.

Student query: {query}"#;

const GENERAL_FALLBACK: &str =
    "Happy to help! You can ask me about your program requirements or what courses to take next.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Course,
    General,
}

/// Labels a query as course-related or general conversation.
///
/// Misclassifying an academic request as general silently drops it, while the
/// reverse merely runs a retrieval that may come back empty, so every failure
/// mode here resolves to [`Intent::Course`].
pub struct IntentClassifier {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(provider: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    #[instrument(skip(self))]
    pub async fn classify(&self, query: &str) -> Intent {
        let prompt = INTENT_PROMPT.replace("{query}", query);

        let response =
            match tokio::time::timeout(self.timeout, self.provider.generate(&prompt)).await {
                Ok(Ok(response)) => response.content,
                Ok(Err(e)) => {
                    warn!("intent classification failed: {e} - defaulting to COURSE");
                    return Intent::Course;
                }
                Err(_) => {
                    warn!("intent classification timed out - defaulting to COURSE");
                    return Intent::Course;
                }
            };

        let label = response.trim().to_uppercase();
        // COURSE wins when both tokens appear.
        if label.contains("COURSE") {
            debug!("classified as COURSE");
            Intent::Course
        } else if label.contains("GENERAL") {
            debug!("classified as GENERAL");
            Intent::General
        } else {
            warn!("unclear classification result: '{label}' - defaulting to COURSE");
            Intent::Course
        }
    }

    /// Friendly reply for general conversation; the short-circuit path when
    /// classification says the query is not academic.
    #[instrument(skip(self))]
    pub async fn respond_general(&self, query: &str) -> String {
        let prompt = GENERAL_PROMPT.replace("{query}", query);

        match tokio::time::timeout(self.timeout, self.provider.generate(&prompt)).await {
            Ok(Ok(response)) => response.content.trim().to_string(),
            Ok(Err(e)) => {
                warn!("general response generation failed: {e}");
                GENERAL_FALLBACK.to_string()
            }
            Err(_) => {
                warn!("general response generation timed out");
                GENERAL_FALLBACK.to_string()
            }
        }
    }
}
