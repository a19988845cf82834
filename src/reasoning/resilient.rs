// Generation resilience: retry on transient overload, one fallback-model
// attempt, and a content-policy regeneration layer on top.
//
// Overload errors are frequent and transient, so primary-model retries
// are cheap and usually succeed. Fallback-model calls are expensive and
// happen at most once per resilient call. Content-quality failures are
// a separate class from transport failures and never consume transport
// retries.

use std::sync::Arc;
use tracing::{debug, error, warn};

use super::provider::{GenerationError, GenerationRequest, ReasoningProvider};
use super::retry::RetryPolicy;

/// Fixed apology surfaced instead of an error by the responder layer.
pub const APOLOGY_MESSAGE: &str =
    "Sorry, I couldn't come up with a useful answer for that just now.";

/// Hedging phrases that mark a generated answer unacceptable.
const HEDGING_PHRASES: [&str; 4] = [
    "i'm not sure",
    "it depends",
    "i can't answer",
    "i don't know",
];

/// True when the text contains any hedging phrase (case-insensitive).
pub fn contains_hedging(text: &str) -> bool {
    let lower = text.to_lowercase();
    HEDGING_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Wraps a `ReasoningProvider` behind the retry/fallback policy.
///
/// Callers see a single `generate()` contract; retries and the fallback
/// attempt only show up as added latency. Dropping the returned future
/// cancels any pending delay and all further attempts.
pub struct ResilientClient {
    provider: Arc<dyn ReasoningProvider>,
    policy: RetryPolicy,
    fallback_model: Option<String>,
}

impl ResilientClient {
    pub fn new(
        provider: Arc<dyn ReasoningProvider>,
        policy: RetryPolicy,
        fallback_model: Option<String>,
    ) -> Self {
        Self {
            provider,
            policy,
            fallback_model,
        }
    }

    pub fn fallback_model(&self) -> Option<&str> {
        self.fallback_model.as_deref()
    }

    /// Resilient generation against the request's primary model.
    ///
    /// Transient-overload failures retry on the policy schedule, then
    /// make exactly one attempt against the fallback model; there is no
    /// second fallback tier. Non-retryable failures propagate
    /// immediately. Blank successful responses are retried once on the
    /// same model, then once on the fallback, before giving up.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut retries_used = 0;
        let mut attempt_index = 0;
        let mut empty_retry_used = false;

        loop {
            let result = self.provider.generate(request).await;
            attempt_index += 1;

            match result {
                Ok(text) if text.trim().is_empty() => {
                    // Attempt records are ephemeral: tracing output only.
                    debug!(
                        "Attempt {} on {}: blank response",
                        attempt_index, request.model_id
                    );
                    if !empty_retry_used {
                        empty_retry_used = true;
                        continue;
                    }
                    return match self.fallback_attempt(request).await {
                        Some(Ok(text)) if text.trim().is_empty() => Err(GenerationError::Provider(
                            "blank response from fallback model".to_string(),
                        )),
                        Some(result) => result,
                        None => Err(GenerationError::Provider(
                            "blank response and no fallback model configured".to_string(),
                        )),
                    };
                }
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient_overload() => {
                    debug!(
                        "Attempt {} on {}: transient overload",
                        attempt_index, request.model_id
                    );
                    match self.policy.delay(retries_used) {
                        Some(delay) => {
                            warn!(
                                "{} overloaded on {}, retrying in {:?} ({}/{})",
                                self.provider.name(),
                                request.model_id,
                                delay,
                                retries_used + 1,
                                self.policy.max_retries()
                            );
                            tokio::time::sleep(delay).await;
                            retries_used += 1;
                        }
                        None => {
                            warn!(
                                "Retries exhausted on {} after {} attempts",
                                request.model_id, attempt_index
                            );
                            return match self.fallback_attempt(request).await {
                                Some(result) => result,
                                None => Err(e),
                            };
                        }
                    }
                }
                // Auth, malformed request, quota: propagate immediately.
                Err(e) => return Err(e),
            }
        }
    }

    /// Exactly one attempt against the configured fallback model, or
    /// `None` when no fallback is configured.
    async fn fallback_attempt(
        &self,
        request: &GenerationRequest,
    ) -> Option<Result<String, GenerationError>> {
        let fallback = self.fallback_model.as_deref()?;
        warn!(
            "Falling back to {} for one final attempt",
            fallback
        );
        Some(self.attempt(request, fallback).await)
    }

    /// Single unwrapped attempt against a specific model. Used by the
    /// responder's content-policy regeneration, which must not consume
    /// transport retries.
    pub async fn attempt(
        &self,
        request: &GenerationRequest,
        model_id: &str,
    ) -> Result<String, GenerationError> {
        self.provider.generate(&request.with_model(model_id)).await
    }
}

/// Content-policy layer above the transport resilience.
///
/// `respond()` always yields plain text: real content, a single
/// fallback-model regeneration when the answer hedges, or the fixed
/// apology when generation fails outright. A hedging answer is not a
/// network problem, so it never triggers transport retries.
pub struct Responder {
    client: ResilientClient,
}

impl Responder {
    pub fn new(client: ResilientClient) -> Self {
        Self { client }
    }

    pub async fn respond(&self, request: &GenerationRequest) -> String {
        match self.client.generate(request).await {
            Ok(text) => {
                if !contains_hedging(&text) {
                    return text;
                }

                let Some(fallback) = self.client.fallback_model() else {
                    // Nothing stronger to ask; accept the hedge.
                    return text;
                };

                warn!("Hedging answer from {}, regenerating once on {}", request.model_id, fallback);
                match self.client.attempt(request, fallback).await {
                    // The regenerated answer is accepted as-is, hedged or not.
                    Ok(regenerated) => regenerated,
                    Err(e) => {
                        error!("Fallback regeneration failed: {}", e);
                        APOLOGY_MESSAGE.to_string()
                    }
                }
            }
            Err(e) => {
                error!("Generation failed: {}", e);
                APOLOGY_MESSAGE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hedging_detection_is_case_insensitive() {
        assert!(contains_hedging("Well, It Depends on the context."));
        assert!(contains_hedging("I don't know."));
        assert!(contains_hedging("Honestly I'm not sure about that"));
        assert!(contains_hedging("I can't answer that question"));
    }

    #[test]
    fn test_confident_answer_is_not_hedging() {
        assert!(!contains_hedging("The deadline is Thursday at noon."));
        assert!(!contains_hedging(""));
    }
}
