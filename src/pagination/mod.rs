//! Pagination module
//!
//! Keyset pagination over a monotonically increasing primary key: each
//! request carries the key of the last record already seen.
//!
//! # Overview
//!
//! The parser validates a page, extracts its records and derives the cursor
//! for the next request, or reports the terminal page.

mod parser;

pub use parser::{PageParser, ParsedPage};
