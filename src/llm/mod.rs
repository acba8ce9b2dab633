//! LLM integration layer
//!
//! The engines talk to language models through the `Completion` seam: the
//! HTTP-backed `LlmClient` in production, a scripted stand-in in tests. Every
//! LLM exchange in this crate is a narrow JSON contract parsed by `parser`.

pub mod client;
pub mod context;
pub mod parser;
pub mod retry;

use crate::core::error::Result;
use async_trait::async_trait;

/// One system-plus-user completion round trip.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}
