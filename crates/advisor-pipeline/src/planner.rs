use advisor_ai::LlmProvider;
use advisor_core::{SearchPlan, StudentContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const PLANNING_PROMPT: &str = r#"You are an academic advisor helping a student plan their academic journey. Think step by step to answer their question effectively.

Student information:
{student_info}

Student query: {query}

Your task:
1. Analyze what specific information you need to properly answer this query
2. Determine what specific searches would retrieve the most relevant information
3. Formulate up to {max_queries} specific, focused search queries that would help answer the student's question

Format your reasoning as:
ANALYSIS: [Your analysis of the student's needs]

SEARCH QUERIES:
1. [First specific search query]
2. [Second specific search query, if needed]
3. [Third specific search query, if needed]

REASONING: [Brief explanation of your search strategy]"#;

/// Turns one student query into up to five targeted search strings.
///
/// The model's free-text reply is parsed with a layered extraction strategy;
/// whatever happens, the plan is never empty.
pub struct SearchPlanner {
    provider: Arc<dyn LlmProvider>,
    max_queries: usize,
    timeout: Duration,
}

impl SearchPlanner {
    pub fn new(provider: Arc<dyn LlmProvider>, max_queries: usize, timeout: Duration) -> Self {
        Self {
            provider,
            max_queries,
            timeout,
        }
    }

    #[instrument(skip(self, context))]
    pub async fn plan(&self, query: &str, context: &StudentContext) -> SearchPlan {
        let prompt = PLANNING_PROMPT
            .replace("{student_info}", &context.render_progress())
            .replace("{query}", query)
            .replace("{max_queries}", &self.max_queries.to_string());

        let reply = match tokio::time::timeout(self.timeout, self.provider.generate(&prompt)).await
        {
            Ok(Ok(response)) => response.content,
            Ok(Err(e)) => {
                warn!("search planning failed: {e} - falling back to the original query");
                return SearchPlan {
                    queries: vec![query.to_string()],
                };
            }
            Err(_) => {
                warn!("search planning timed out - falling back to the original query");
                return SearchPlan {
                    queries: vec![query.to_string()],
                };
            }
        };

        let mut queries = extract_search_queries(&reply, self.max_queries);
        if queries.is_empty() {
            queries.push(query.to_string());
        }

        debug!(count = queries.len(), "search plan ready");
        SearchPlan { queries }
    }
}

/// Layered extraction of search strings from a free-text planning reply.
/// Strategies are tried in order until one yields at least one query.
pub fn extract_search_queries(reply: &str, max_queries: usize) -> Vec<String> {
    let mut queries = extract_from_labeled_section(reply);

    if queries.is_empty() {
        queries = extract_prefixed_lines(reply);
    }

    if queries.is_empty() && reply.trim().len() > 30 {
        let synthetic: String = reply
            .chars()
            .take(200)
            .collect::<String>()
            .replace('\n', " ")
            .trim()
            .to_string();
        queries.push(synthetic);
    }

    queries.truncate(max_queries);
    queries
}

fn extract_from_labeled_section(reply: &str) -> Vec<String> {
    let Some(start) = reply.find("SEARCH QUERIES") else {
        return Vec::new();
    };

    let section = &reply[start..];
    let section = match section.find("REASONING:") {
        Some(end) => &section[..end],
        None => section,
    };

    section
        .lines()
        .filter_map(strip_list_marker)
        .filter(|q| is_usable_query(q))
        .map(|q| q.to_string())
        .collect()
}

fn extract_prefixed_lines(reply: &str) -> Vec<String> {
    reply
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.starts_with("Query:") || line.starts_with("Search for:") {
                line.split_once(':').map(|(_, rest)| rest.trim())
            } else {
                None
            }
        })
        .filter(|q| is_usable_query(q))
        .map(|q| q.to_string())
        .collect()
}

/// Strips a leading bullet marker or "1." / "2)" style numeral.
fn strip_list_marker(line: &str) -> Option<&str> {
    let line = line.trim();

    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return Some(rest.trim());
        }
    }

    None
}

/// Empty lines and bracketed template placeholders are discarded.
fn is_usable_query(query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return false;
    }
    !(query.starts_with('[') && query.ends_with(']'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;

    fn planner(llm: ScriptedLlm) -> SearchPlanner {
        SearchPlanner::new(Arc::new(llm), 5, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn extracts_numbered_queries_from_labeled_section() {
        let reply = "ANALYSIS: The student needs the next CS course.\n\n\
                     SEARCH QUERIES:\n\
                     1. intro data structures course\n\
                     2. CS 210 follow-up\n\n\
                     REASONING: Both target the CS intro sequence.";
        let plan = planner(ScriptedLlm::replies([reply]))
            .plan("what next", &StudentContext::default())
            .await;

        assert_eq!(
            plan.queries,
            vec!["intro data structures course", "CS 210 follow-up"]
        );
    }

    #[test]
    fn bullet_markers_are_stripped() {
        let reply = "SEARCH QUERIES:\n- upper division math\n* statistics elective";
        let queries = extract_search_queries(reply, 5);
        assert_eq!(queries, vec!["upper division math", "statistics elective"]);
    }

    #[test]
    fn placeholder_lines_are_discarded() {
        let reply = "SEARCH QUERIES:\n1. [First specific search query]\n2. real query here";
        let queries = extract_search_queries(reply, 5);
        assert_eq!(queries, vec!["real query here"]);
    }

    #[test]
    fn falls_back_to_prefixed_lines() {
        let reply = "I would run these.\nQuery: discrete math prerequisites\nSearch for: writing requirement courses";
        let queries = extract_search_queries(reply, 5);
        assert_eq!(
            queries,
            vec![
                "discrete math prerequisites",
                "writing requirement courses"
            ]
        );
    }

    #[test]
    fn falls_back_to_leading_text_as_single_query() {
        let reply = "The student should look into upper-division electives that satisfy the core requirement.";
        let queries = extract_search_queries(reply, 5);
        assert_eq!(queries.len(), 1);
        assert!(queries[0].starts_with("The student should"));
    }

    #[test]
    fn caps_at_requested_maximum() {
        let reply = "SEARCH QUERIES:\n1. a\n2. b\n3. c\n4. d\n5. e\n6. f\n7. g";
        let queries = extract_search_queries(reply, 5);
        assert_eq!(queries.len(), 5);
    }

    #[tokio::test]
    async fn model_failure_yields_original_query_plan() {
        let plan = planner(ScriptedLlm::failing("no model"))
            .plan("what math should I take", &StudentContext::default())
            .await;

        assert_eq!(plan.queries, vec!["what math should I take"]);
    }

    #[tokio::test]
    async fn plan_is_never_empty() {
        // Reply too short for the synthetic fallback and with no markers.
        let plan = planner(ScriptedLlm::replies(["ok"]))
            .plan("anything", &StudentContext::default())
            .await;

        assert_eq!(plan.queries, vec!["anything"]);
    }
}
