use advisor_ai::LlmProvider;
use advisor_core::{
    Priority, Recommendation, RecommendationResult, StudentContext, VerifiedCandidate,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const RECOMMENDATION_PROMPT: &str = r#"You are an academic advisor helping a student pick courses.

Student question: {query}

{student_info}

These courses are confirmed available to the student:
{courses}

Pick the courses that best serve the student's goals and degree progress. Reply with a section in exactly this format:

RECOMMENDED COURSES:
- [course code]: [one-sentence reason] | [High/Medium/Low]

List the strongest picks first. Only use course codes from the list above."#;

const FINAL_RESPONSE_PROMPT: &str = r#"You are a friendly academic advisor. Write a short, encouraging message (2-3 sentences) to the student summarizing the course recommendations below. Do not mention course codes; the student sees the full details separately. Use a warm tone and an emoji or two.

Student question: {query}

Recommendations:
{recommendations}"#;

const NO_MATCH_MESSAGE: &str =
    "I couldn't find any courses that fit your request this time. Try rephrasing your question or asking about a different subject area. 😊";

const FALLBACK_MESSAGE: &str =
    "I found some great course options for you! Take a look at the details below to see how each one fits into your plan. 📚";

/// Turns verified candidates into the final ordered recommendation list and
/// the student-facing message. Never fails; every model error degrades to a
/// deterministic fallback.
pub struct ResponseComposer {
    reasoning: Arc<dyn LlmProvider>,
    response: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl ResponseComposer {
    pub fn new(
        reasoning: Arc<dyn LlmProvider>,
        response: Arc<dyn LlmProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            reasoning,
            response,
            timeout,
        }
    }

    #[instrument(skip(self, context, verified), fields(verified = verified.len()))]
    pub async fn compose(
        &self,
        query: &str,
        context: &StudentContext,
        verified: Vec<VerifiedCandidate>,
    ) -> RecommendationResult {
        let valid: Vec<&VerifiedCandidate> =
            verified.iter().filter(|v| v.outcome.is_valid()).collect();

        if valid.is_empty() {
            debug!("no valid candidates survived verification");
            return RecommendationResult::courses(NO_MATCH_MESSAGE, Vec::new());
        }

        let mut recommendations = self.rank_candidates(query, context, &valid).await;
        sort_recommendations(&mut recommendations);

        let message = self.write_message(query, &recommendations).await;
        RecommendationResult::courses(message, recommendations)
    }

    /// Asks the reasoning model to pick and prioritize courses, then merges
    /// its picks with the remaining valid candidates. A call or parse failure
    /// falls back to recommending the first three candidates.
    async fn rank_candidates(
        &self,
        query: &str,
        context: &StudentContext,
        valid: &[&VerifiedCandidate],
    ) -> Vec<Recommendation> {
        let prompt = RECOMMENDATION_PROMPT
            .replace("{query}", query)
            .replace("{student_info}", &context.render_progress())
            .replace("{courses}", &render_course_block(valid));

        let picks = match tokio::time::timeout(self.timeout, self.reasoning.generate(&prompt)).await
        {
            Ok(Ok(response)) => parse_recommended_courses(&response.content),
            Ok(Err(e)) => {
                warn!("recommendation call failed: {e} - using fallback picks");
                Vec::new()
            }
            Err(_) => {
                warn!("recommendation call timed out - using fallback picks");
                Vec::new()
            }
        };

        build_recommendations(valid, picks)
    }

    async fn write_message(&self, query: &str, recommendations: &[Recommendation]) -> String {
        let summary = recommendations
            .iter()
            .filter(|r| r.is_recommended)
            .map(|r| format!("- {}: {}", r.course.course_name, r.reason))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = FINAL_RESPONSE_PROMPT
            .replace("{query}", query)
            .replace("{recommendations}", &summary);

        match tokio::time::timeout(self.timeout, self.response.generate(&prompt)).await {
            Ok(Ok(response)) if !response.content.trim().is_empty() => {
                response.content.trim().to_string()
            }
            Ok(Ok(_)) => FALLBACK_MESSAGE.to_string(),
            Ok(Err(e)) => {
                warn!("response call failed: {e} - using fallback message");
                FALLBACK_MESSAGE.to_string()
            }
            Err(_) => {
                warn!("response call timed out - using fallback message");
                FALLBACK_MESSAGE.to_string()
            }
        }
    }
}

fn render_course_block(valid: &[&VerifiedCandidate]) -> String {
    valid
        .iter()
        .map(|v| {
            let course = &v.course;
            let description: String = course.description.chars().take(100).collect();
            format!(
                "- {} ({}): {} | prerequisites: {} | credits: {}",
                course.course_code,
                course.course_name,
                description,
                if course.prerequisites.trim().is_empty() {
                    "none listed"
                } else {
                    course.prerequisites.trim()
                },
                course.credit_hours.as_deref().unwrap_or("unknown"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One pick parsed from a "RECOMMENDED COURSES:" block line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pick {
    pub code: String,
    pub reason: String,
    pub priority: Priority,
}

/// Parses the "RECOMMENDED COURSES:" block. Expected line shape:
/// `- CS 211: builds directly on your intro sequence | High`
/// Lines that do not parse are skipped.
pub(crate) fn parse_recommended_courses(reply: &str) -> Vec<Pick> {
    let Some(start) = reply.find("RECOMMENDED COURSES:") else {
        return Vec::new();
    };
    let section = &reply[start + "RECOMMENDED COURSES:".len()..];

    let mut picks = Vec::new();
    for line in section.lines() {
        let line = line.trim();
        let Some(entry) = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
        else {
            continue;
        };

        let Some((code, details)) = entry.split_once(':') else {
            continue;
        };
        let code = code.trim().trim_start_matches('[').trim_end_matches(']').trim();
        if code.is_empty() {
            continue;
        }

        let (reason, priority) = match details.split_once('|') {
            Some((reason, priority)) => (reason.trim(), Priority::parse_lenient(priority)),
            None => (details.trim(), Priority::Medium),
        };

        picks.push(Pick {
            code: code.to_string(),
            reason: if reason.is_empty() {
                "Recommended for your next semester.".to_string()
            } else {
                reason.to_string()
            },
            priority,
        });
    }

    picks
}

/// Matches picks back to candidates and appends the rest as non-recommended
/// context. With no usable picks, the first three candidates become the
/// recommendations.
fn build_recommendations(valid: &[&VerifiedCandidate], picks: Vec<Pick>) -> Vec<Recommendation> {
    let mut recommendations = Vec::with_capacity(valid.len());
    let mut used: HashSet<usize> = HashSet::new();

    for pick in picks {
        let found = valid.iter().enumerate().find(|(i, v)| {
            !used.contains(i)
                && (v.course.course_code == pick.code
                    || v.course.course_code.contains(&pick.code))
        });
        if let Some((i, v)) = found {
            used.insert(i);
            recommendations.push(Recommendation {
                course: v.course.clone(),
                is_recommended: true,
                reason: pick.reason,
                priority: pick.priority,
            });
        } else {
            debug!(code = %pick.code, "pick does not match any valid candidate");
        }
    }

    if recommendations.is_empty() {
        for (i, v) in valid.iter().enumerate().take(3) {
            used.insert(i);
            recommendations.push(Recommendation {
                course: v.course.clone(),
                is_recommended: true,
                reason: "Suggested option for your next semester.".to_string(),
                priority: Priority::Medium,
            });
        }
    }

    for (i, v) in valid.iter().enumerate() {
        if used.contains(&i) {
            continue;
        }
        recommendations.push(Recommendation {
            course: v.course.clone(),
            is_recommended: false,
            reason: "Also available and open to you.".to_string(),
            priority: Priority::Medium,
        });
    }

    recommendations
}

/// Recommended courses first, then by priority. The sort is stable, so model
/// ordering breaks ties.
pub(crate) fn sort_recommendations(recommendations: &mut [Recommendation]) {
    recommendations.sort_by_key(|r| (!r.is_recommended, r.priority.rank()));
}
