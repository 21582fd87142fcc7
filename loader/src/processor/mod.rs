pub mod extract;
pub mod flatten;
pub mod loader;
pub mod normalize;
mod pipeline;

pub use extract::{JsonPath, extract, extract_json, extract_or};
pub use flatten::{ExtractionPlan, FileParams, Param, Scope, Source, TableMapping, flatten};
pub use loader::BatchLoader;
pub use normalize::Normalizer;
pub use pipeline::{Pipeline, RecordSource, TableBatch};
