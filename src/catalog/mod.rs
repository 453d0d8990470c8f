//! Collection enumeration
//!
//! Builds the list of parent entities from an offset-capped listing by
//! walking it once per sort order and merging the passes by alias.

mod enumerator;

pub use enumerator::{CollectionEnumerator, Enumeration};
