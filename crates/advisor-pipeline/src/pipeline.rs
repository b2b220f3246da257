use crate::composer::ResponseComposer;
use crate::context::ContextBuilder;
use crate::intent::{Intent, IntentClassifier};
use crate::planner::SearchPlanner;
use crate::retrieval::RetrievalEngine;
use crate::verifier::ConstraintVerifier;
use advisor_ai::LlmProvider;
use advisor_core::{
    CourseIndex, PipelineConfig, RecommendationResult, StudentId, StudentRecordStore,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

const FAILURE_MESSAGE: &str =
    "I encountered an issue while finding courses for you. Please try again or rephrase your request. 🙇";

/// The model assignments for the pipeline's three model roles. Fast and cheap
/// for classification, a stronger reasoning model for planning and
/// verification, and a conversational model for the final message.
#[derive(Clone)]
pub struct ModelSet {
    pub classifier: Arc<dyn LlmProvider>,
    pub reasoning: Arc<dyn LlmProvider>,
    pub response: Arc<dyn LlmProvider>,
}

impl ModelSet {
    /// Uses one provider for every role. Convenient in tests and small
    /// deployments.
    pub fn shared(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            classifier: provider.clone(),
            reasoning: provider.clone(),
            response: provider,
        }
    }
}

/// The end-to-end recommendation pipeline. Stages run strictly in sequence;
/// each stage owns its failure policy, so the pipeline itself always returns
/// a well-formed result.
pub struct RecommendationPipeline {
    config: PipelineConfig,
    context_builder: ContextBuilder,
    classifier: IntentClassifier,
    planner: SearchPlanner,
    retrieval: RetrievalEngine,
    verifier: ConstraintVerifier,
    composer: ResponseComposer,
}

impl RecommendationPipeline {
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn StudentRecordStore>,
        index: Arc<dyn CourseIndex>,
        models: ModelSet,
    ) -> Self {
        let context_builder = ContextBuilder::new(store);
        let classifier = IntentClassifier::new(models.classifier, config.classify_timeout);
        let planner = SearchPlanner::new(
            models.reasoning.clone(),
            config.max_search_queries,
            config.plan_timeout,
        );
        let retrieval = RetrievalEngine::new(
            index,
            config.retrieval_width,
            config.search_top_k,
            config.search_timeout,
        );
        let verifier = ConstraintVerifier::new(models.reasoning.clone(), config.verify_timeout);
        let composer = ResponseComposer::new(
            models.reasoning,
            models.response,
            config.compose_timeout,
        );

        Self {
            config,
            context_builder,
            classifier,
            planner,
            retrieval,
            verifier,
            composer,
        }
    }

    /// Runs the full pipeline for one student. `query` defaults to the
    /// standard next-term question when absent or blank.
    #[instrument(skip(self, query))]
    pub async fn get_recommendations(
        &self,
        student_id: StudentId,
        query: Option<&str>,
    ) -> RecommendationResult {
        let started = Instant::now();
        let query = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => q,
            None => self.config.default_query.as_str(),
        };

        let context = match self.context_builder.build(student_id).await {
            Ok(context) => context,
            Err(e) => {
                error!(student_id, "failed to build student context: {e}");
                return RecommendationResult::courses(FAILURE_MESSAGE, Vec::new());
            }
        };

        if self.classifier.classify(query).await == Intent::General {
            let message = self.classifier.respond_general(query).await;
            info!(
                student_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "answered as general conversation"
            );
            return RecommendationResult::general(message);
        }

        let plan = self.planner.plan(query, &context).await;
        let candidates = self.retrieval.retrieve(&plan).await;
        let verified = self.verifier.verify(&context, candidates).await;
        let result = self.composer.compose(query, &context, verified).await;

        info!(
            student_id,
            queries = plan.len(),
            recommendations = result.course_data.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "recommendation pipeline complete"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{course_document, FakeRecordStore, ScriptedIndex, ScriptedLlm};
    use advisor_core::ResultKind;

    fn pipeline(
        store: FakeRecordStore,
        index: ScriptedIndex,
        llm: ScriptedLlm,
    ) -> RecommendationPipeline {
        RecommendationPipeline::new(
            PipelineConfig::default(),
            Arc::new(store),
            Arc::new(index),
            ModelSet::shared(Arc::new(llm)),
        )
    }

    #[tokio::test]
    async fn record_store_failure_yields_apology() {
        let pipeline = pipeline(
            FakeRecordStore::failing(),
            ScriptedIndex::with_documents(Vec::new()),
            ScriptedLlm::replies(["unused"]),
        );

        let result = pipeline.get_recommendations(42, None).await;
        assert_eq!(result.kind, ResultKind::CourseRecommendations);
        assert!(result.course_data.is_empty());
        assert_eq!(result.message, FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn general_intent_short_circuits_retrieval() {
        let llm = ScriptedLlm::replies([
            "GENERAL",
            "Hello! How can I help with your studies today?",
        ]);
        let pipeline = pipeline(
            FakeRecordStore::new(["CS 210"]),
            ScriptedIndex::failing(),
            llm,
        );

        let result = pipeline.get_recommendations(42, Some("hi there")).await;
        assert_eq!(result.kind, ResultKind::GeneralResponse);
        assert!(result.course_data.is_empty());
        assert!(result.message.contains("help"));
    }

    #[tokio::test]
    async fn blank_query_falls_back_to_default_question() {
        let llm = ScriptedLlm::replies([
            "COURSE",
            "SEARCH QUERIES:\n- intermediate programming courses",
            "RECOMMENDED COURSES:\n- CS 211: Next step after intro | High",
            "You're all set for a strong term! 🎓",
        ]);
        let index = ScriptedIndex::with_documents(vec![course_document(
            "CS 211",
            &[("course_name", "Intermediate CS"), ("available_seats", "5")],
        )]);
        let pipeline = pipeline(FakeRecordStore::new(["CS 210"]), index, llm);

        let result = pipeline.get_recommendations(42, Some("   ")).await;
        assert_eq!(result.kind, ResultKind::CourseRecommendations);
        assert_eq!(result.course_data.len(), 1);
        assert_eq!(result.course_data[0].course.course_code, "CS 211");
    }
}
