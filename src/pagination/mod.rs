//! Pagination module
//!
//! Supports: offset listings with an upstream offset ceiling, and opaque
//! next-page cursors.
//!
//! # Overview
//!
//! A [`Paginator`] decides which request comes next; a [`PageWalker`] drives
//! it against a fetcher and yields decoded pages lazily. Walks are restartable
//! only from a [`PaginationState`] (an offset or a stored cursor).

mod strategies;
mod types;
mod walker;

pub use strategies::{CursorPaginator, OffsetPaginator};
pub use types::{NextPage, PageRequest, PaginationState, Paginator};
pub use walker::PageWalker;

#[cfg(test)]
mod tests;
