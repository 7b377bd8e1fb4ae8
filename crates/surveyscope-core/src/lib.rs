//! SurveyScope core: paper model, load state, aggregation and projection.

pub mod config;
pub mod error;
pub mod load_state;
pub mod models;
pub mod store;
pub mod view;

pub use config::{AppConfig, ChapterSpec};
pub use error::{ExitCode, Result, SurveyError};
pub use models::*;

pub use load_state::{LoadTracker, Pagination};
pub use store::{AggregationStore, DateDistribution, MergeReport};
pub use view::{PaperCursor, Projection, ViewProjector};
