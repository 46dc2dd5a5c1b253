//! Tenant Triage — classify tenant emails into structured requests.

pub mod channels;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod reply;
pub mod workflow;
