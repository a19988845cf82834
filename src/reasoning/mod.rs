//! Generation resilience
//!
//! Wraps reasoning-model calls with retry, model fallback, and a
//! content-policy regeneration layer. Independent of the audio path;
//! consumes its transcript output only as prompt context.

mod provider;
mod resilient;
mod retry;

pub use provider::{
    CloudProvider, GenerationError, GenerationRequest, LocalProvider, ReasoningProvider,
};
pub use resilient::{contains_hedging, Responder, ResilientClient, APOLOGY_MESSAGE};
pub use retry::RetryPolicy;
