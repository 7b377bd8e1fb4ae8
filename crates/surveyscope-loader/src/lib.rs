//! Async loading for SurveyScope: static sources, shard and index fetching,
//! and the session that ties them to the core store.

pub mod controller;
pub mod error;
pub mod index_cache;
pub mod session;
pub mod shard;
pub mod source;

#[cfg(test)]
mod testing;

pub use controller::{ChapterPhase, EngineState, LoadController, LoadOutcome, LoadReport, SkipReason};
pub use error::{LoaderError, ParseError, Result};
pub use index_cache::IndexCache;
pub use session::SurveySession;
pub use shard::{ParsedShard, ShardFetcher, parse_shard};
pub use source::{DirSource, HttpSource, StaticSource, open_source};
