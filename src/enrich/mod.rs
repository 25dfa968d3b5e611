/// Auxiliary enrichment services
///
/// Smaller model-backed helpers around the main pipeline: per-chapter
/// explanations, translation of generated text, proof-reading of on-screen
/// text, and Wikipedia lookups.

pub mod explainer;
pub mod refiner;
pub mod translator;
pub mod wikipedia;

pub use explainer::Explainer;
pub use refiner::{RefineMode, SegmentRefiner};
pub use translator::Translator;
pub use wikipedia::WikipediaClient;
