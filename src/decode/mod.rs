//! Response decoding
//!
//! Turns listing responses into transient [`RawPage`]s. Two layouts are
//! supported out of the box: offset listings (`results[]` plus a reported
//! total) and cursor listings (`collection[]` plus `next_href`).

mod decoders;
mod types;

pub use decoders::PageDecoder;
pub use types::{PageLayout, RawPage};
