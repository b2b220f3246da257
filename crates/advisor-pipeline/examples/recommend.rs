//! Runs the recommendation pipeline against live OpenAI and Pinecone
//! endpoints for a hard-coded demo student.
//!
//! Required environment: OPENAI_API_KEY, PINECONE_API_KEY, PINECONE_HOST.

use advisor_ai::{EmbeddingClient, EmbeddingConfig, OpenAiProvider, PineconeConfig, PineconeIndex};
use advisor_core::{
    PipelineConfig, ProgramRequirement, ProgramType, RequirementItem, Result, StudentId,
    StudentRecordStore,
};
use advisor_pipeline::{ModelSet, RecommendationPipeline};
use async_trait::async_trait;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

struct DemoRecordStore;

#[async_trait]
impl StudentRecordStore for DemoRecordStore {
    async fn get_completed_courses(&self, _student_id: StudentId) -> Result<Vec<String>> {
        Ok(vec!["CS 210".to_string(), "MATH 251".to_string()])
    }

    async fn get_programs(&self, _student_id: StudentId) -> Result<Vec<ProgramRequirement>> {
        Ok(vec![ProgramRequirement {
            program_name: "Computer Science".to_string(),
            program_type: ProgramType::Major,
            required_courses: vec![
                RequirementItem::Code("CS 210".to_string()),
                RequirementItem::Code("CS 211".to_string()),
                RequirementItem::Code("CS 212".to_string()),
                RequirementItem::Alternative {
                    requirement_name: "Math Sequence".to_string(),
                    courses_needed: 1,
                    options: vec!["MATH 252".to_string(), "MATH 262".to_string()],
                },
            ],
        }])
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let models = ModelSet {
        classifier: Arc::new(OpenAiProvider::openai("gpt-4o-mini")?),
        reasoning: Arc::new(OpenAiProvider::openai("o1-mini")?),
        response: Arc::new(OpenAiProvider::openai("gpt-4o")?),
    };

    let host = std::env::var("PINECONE_HOST")?;
    let embedder = EmbeddingClient::new(EmbeddingConfig::default())?;
    let index = PineconeIndex::new(PineconeConfig::from_env(host), embedder)?;

    let pipeline = RecommendationPipeline::new(
        PipelineConfig::default(),
        Arc::new(DemoRecordStore),
        Arc::new(index),
        models,
    );

    let query = std::env::args().nth(1);
    let result = pipeline.get_recommendations(951_000_001, query.as_deref()).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
