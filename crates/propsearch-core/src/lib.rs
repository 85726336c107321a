//! propsearch-core
//!
//! Domain types, the filter model, the error taxonomy and the capability
//! traits shared by the interpreter, embedding, index and hybrid crates.

pub mod config;
pub mod error;
pub mod filters;
pub mod traits;
pub mod types;

pub use error::{Error, ProviderError, Result};
pub use filters::{Attribute, Constraint, FilterSet, FilterValue, SearchFilters};
