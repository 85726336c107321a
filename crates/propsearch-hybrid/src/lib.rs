//! propsearch-hybrid
//!
//! Fuses the lexical and semantic candidate lists, hydrates the winners
//! into listings and orchestrates a full search request.

pub mod assembler;
pub mod engine;
pub mod fusion;

pub use assembler::{AssembledPage, ResultAssembler};
pub use engine::{EngineOptions, HybridSearchEngine};
pub use fusion::{fuse, fuse_top, FusionWeights};
