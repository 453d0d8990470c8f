//! Record extraction
//!
//! Maps raw API records to [`CanonicalRecord`]s. Extraction is pure: a record
//! that lacks a required field is filtered out, never an error.

mod extractors;
mod types;

pub use extractors::{parse_tags, EpisodeExtractor, Extractor, TrackExtractor};
pub use types::CanonicalRecord;
