//! Course recommendation pipeline: student context, intent classification,
//! search planning, retrieval, constraint verification, and response
//! composition, plus a background fire-and-poll front.

pub mod background;
pub mod composer;
pub mod context;
pub mod intent;
pub mod pipeline;
pub mod planner;
pub mod retrieval;
pub mod testing;
pub mod verifier;

pub use background::{BackgroundAdvisor, PollResponse};
pub use composer::ResponseComposer;
pub use context::ContextBuilder;
pub use intent::{Intent, IntentClassifier};
pub use pipeline::{ModelSet, RecommendationPipeline};
pub use planner::SearchPlanner;
pub use retrieval::RetrievalEngine;
pub use verifier::ConstraintVerifier;
