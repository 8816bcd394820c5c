//! Conversational layer for the negotiation engine.
//!
//! The language model is strictly a copywriter. It never decides discounts,
//! coupon codes, or eligibility; those are deterministic decisions made by
//! the pricing core before any prompt is built. If the model is slow,
//! unreachable, or unconfigured, a deterministic template carries the same
//! offer instead.

pub mod llm;
pub mod prompt;
pub mod responder;

pub use llm::{HttpLlmClient, LlmClient, NullLlmClient};
pub use prompt::PromptContext;
pub use responder::NegotiationResponder;
