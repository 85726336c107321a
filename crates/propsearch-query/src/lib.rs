//! propsearch-query
//!
//! Turns free-text listing queries into structured hard filters plus a
//! residual phrase. Pattern rules live in `rules`; `interpreter` merges the
//! extracted hints with caller-supplied filters.

pub mod interpreter;
pub mod rules;

pub use interpreter::{extract, interpret, Hints};
