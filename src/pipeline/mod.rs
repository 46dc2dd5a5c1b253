//! Tenant request pipeline.
//!
//! Every inbound email flows through:
//! 1. `LlmExtractor::extract()` — LLM → JSON candidate
//! 2. `schema::validate_record()` — strict contract check
//! 3. `normalize::normalize()` — request type re-derived from the body
//!
//! On any failure in 1–2 the `RuleExtractor` produces the record instead.
//! `RequestProcessor` composes the steps and never fails.

pub mod llm_extractor;
pub mod normalize;
pub mod processor;
pub mod rules;
pub mod schema;
pub mod types;

pub use processor::RequestProcessor;
pub use types::{ExtractionSource, ProcessedRequest, RawMessage, RequestRecord, RequestType};
