//! Provider-backed generator with token-budget escalation.

use crate::error::PipelineError;
use crate::generator::probe::is_complete;
use crate::generator::retry::RetryPolicy;
use crate::generator::{FinishReason, Generation, GenerationRequest, Generator};
use crate::provider::{CompletionOptions, ModelProviderClient};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_TOKEN_LADDER: [u32; 4] = [4096, 8192, 16384, 32768];

/// Wraps a provider client; escalates through `ladder` when a reply is cut off.
///
/// A reply counts as cut off when the provider reports truncation or when a
/// JSON request fails the completeness probe.
pub struct LadderGenerator {
    client: Arc<dyn ModelProviderClient>,
    ladder: Vec<u32>,
    retry: RetryPolicy,
    defaults: CompletionOptions,
}

impl LadderGenerator {
    pub fn new(client: Arc<dyn ModelProviderClient>) -> Self {
        Self {
            client,
            ladder: DEFAULT_TOKEN_LADDER.to_vec(),
            retry: RetryPolicy::default(),
            defaults: CompletionOptions::default(),
        }
    }

    pub fn with_ladder(mut self, mut ladder: Vec<u32>) -> Self {
        ladder.sort_unstable();
        ladder.dedup();
        if !ladder.is_empty() {
            self.ladder = ladder;
        }
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_default_options(mut self, defaults: CompletionOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Rungs at or above the request's starting budget.
    fn rungs_for(&self, request: &GenerationRequest) -> Vec<u32> {
        match request.max_output_tokens {
            Some(start) => {
                let rungs: Vec<u32> = self.ladder.iter().copied().filter(|r| *r >= start).collect();
                if rungs.is_empty() {
                    vec![start]
                } else {
                    rungs
                }
            }
            None => self.ladder.clone(),
        }
    }
}

#[async_trait]
impl Generator for LadderGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, PipelineError> {
        let label = request.label();
        let rungs = self.rungs_for(&request);
        let mut last_detail = String::from("no attempt made");

        for (rung_index, &budget) in rungs.iter().enumerate() {
            let options = CompletionOptions {
                max_tokens: Some(budget),
                json_response: request.json,
                ..self.defaults.clone()
            };
            let started = Instant::now();
            let response = self
                .retry
                .run(&label, || {
                    self.client
                        .complete(request.messages.clone(), options.clone())
                })
                .await?;

            let finish = FinishReason::from_provider(response.finish_reason.as_deref());
            debug!(
                label = %label,
                provider = %self.client.provider_name(),
                model = %response.model,
                budget,
                completion_tokens = response.usage.completion_tokens,
                duration_ms = started.elapsed().as_millis() as u64,
                "generation finished"
            );

            let cut_off = finish.is_truncated()
                || (request.json && !is_complete(&response.content, &request.expected_keys));
            if !cut_off {
                return Ok(Generation {
                    content: response.content,
                    finish_reason: finish,
                });
            }

            last_detail = if finish.is_truncated() {
                format!("provider reported truncation at {} tokens", budget)
            } else {
                format!("incomplete JSON reply at {} tokens", budget)
            };
            if rung_index + 1 < rungs.len() {
                warn!(
                    label = %label,
                    budget,
                    next_budget = rungs[rung_index + 1],
                    "output cut off, escalating token budget"
                );
            }
        }

        Err(PipelineError::OutputTruncated {
            max_output_tokens: rungs.last().copied().unwrap_or_default(),
            detail: format!("{}: {}", label, last_detail),
        })
    }
}
