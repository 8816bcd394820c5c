//! Negotiation pipeline: build context, check eligibility, determine the
//! strategy, maybe issue a coupon, record the outcome, respond.
//!
//! The orchestrator in this crate owns the order of those steps and the
//! degradation rules between them. Pricing decisions live in `haggle-core`,
//! persistence in `haggle-db`, and customer-facing copy in `haggle-agent`.

pub mod bootstrap;
pub mod context;
pub mod logging;
pub mod orchestrator;
pub mod response;

pub use bootstrap::{bootstrap, Application, BootstrapError};
pub use context::{
    has_recent_purchase, CartItem, CustomerDirectory, NegotiationRequest, StaticCustomerDirectory,
};
pub use logging::init_logging;
pub use orchestrator::NegotiationOrchestrator;
pub use response::NegotiationResponse;
