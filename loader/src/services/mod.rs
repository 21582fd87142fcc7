pub mod loader;

pub use loader::{FileOutcome, LoadSummary, LoaderService};
