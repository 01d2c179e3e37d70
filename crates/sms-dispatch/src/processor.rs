//! Batch Processor
//!
//! One cycle fetches up to `batch_size` unsent messages and handles each on
//! its own task:
//! - content over the length limit is marked `invalid` without a delivery attempt
//! - an accepted delivery is marked `sent`, then recorded in the confirmation cache
//! - a failed or unaccepted delivery leaves the message `unsent`
//!
//! Every failure is logged and counted. Nothing is returned to the caller as an error.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use sms_common::{confirmation_key, Message, SentConfirmation, MAX_CONTENT_LENGTH};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::cache::ConfirmationCache;
use crate::delivery::DeliveryClient;
use crate::store::MessageStore;

/// Counters for a single dispatch cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub sent: usize,
    pub invalid: usize,
    pub delivery_failed: usize,
    pub unconfirmed: usize,
    /// Status writes (`mark_sent` / `mark_invalid`) that failed
    pub reconcile_failed: usize,
    pub panicked: usize,
    pub fetch_failed: bool,
}

impl CycleReport {
    pub fn is_empty(&self) -> bool {
        self.fetched == 0
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Sent { recorded } => {
                self.sent += 1;
                if !recorded {
                    self.reconcile_failed += 1;
                }
            }
            Outcome::Invalid { recorded } => {
                self.invalid += 1;
                if !recorded {
                    self.reconcile_failed += 1;
                }
            }
            Outcome::DeliveryFailed => self.delivery_failed += 1,
            Outcome::Unconfirmed => self.unconfirmed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Sent { recorded: bool },
    Invalid { recorded: bool },
    DeliveryFailed,
    Unconfirmed,
}

pub struct BatchProcessor {
    store: Arc<dyn MessageStore>,
    client: Arc<dyn DeliveryClient>,
    cache: Option<Arc<dyn ConfirmationCache>>,
    batch_size: u32,
}

impl BatchProcessor {
    pub fn new(
        store: Arc<dyn MessageStore>,
        client: Arc<dyn DeliveryClient>,
        cache: Option<Arc<dyn ConfirmationCache>>,
        batch_size: u32,
    ) -> Self {
        Self {
            store,
            client,
            cache,
            batch_size,
        }
    }

    /// Run one fetch and fan-out cycle, waiting for every message task to finish.
    pub async fn run_cycle(&self) -> CycleReport {
        let span = info_span!("dispatch_cycle", batch_size = self.batch_size);
        self.process_batch().instrument(span).await
    }

    async fn process_batch(&self) -> CycleReport {
        metrics::counter!("dispatcher.cycles_total").increment(1);
        let mut report = CycleReport::default();

        let messages = match self.store.fetch_unsent(self.batch_size).await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "Failed to fetch unsent messages");
                metrics::counter!("dispatcher.fetch_errors_total").increment(1);
                report.fetch_failed = true;
                return report;
            }
        };

        report.fetched = messages.len();
        if messages.is_empty() {
            debug!("No unsent messages");
            return report;
        }

        let handles: Vec<_> = messages
            .into_iter()
            .map(|message| {
                let span = info_span!("dispatch_message", message_id = message.id);
                let store = self.store.clone();
                let client = self.client.clone();
                let cache = self.cache.clone();
                tokio::spawn(process_message(store, client, cache, message).instrument(span))
            })
            .collect();

        for result in join_all(handles).await {
            match result {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(error = %e, "Message task failed");
                    metrics::counter!("dispatcher.messages.failed_total").increment(1);
                    report.panicked += 1;
                }
            }
        }

        info!(
            fetched = report.fetched,
            sent = report.sent,
            invalid = report.invalid,
            delivery_failed = report.delivery_failed,
            unconfirmed = report.unconfirmed,
            reconcile_failed = report.reconcile_failed,
            panicked = report.panicked,
            "Dispatch cycle complete"
        );
        report
    }
}

async fn process_message(
    store: Arc<dyn MessageStore>,
    client: Arc<dyn DeliveryClient>,
    cache: Option<Arc<dyn ConfirmationCache>>,
    message: Message,
) -> Outcome {
    if message.exceeds_content_limit() {
        warn!(
            length = message.content_length(),
            max = MAX_CONTENT_LENGTH,
            "Content too long, marking message invalid"
        );
        metrics::counter!("dispatcher.messages.invalid_total").increment(1);
        let recorded = match store.mark_invalid(message.id).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to mark message invalid");
                false
            }
        };
        return Outcome::Invalid { recorded };
    }

    let confirmation = match client.send(&message.content, &message.recipient).await {
        Ok(Some(confirmation)) => confirmation,
        Ok(None) => {
            warn!("Delivery not accepted, message stays unsent");
            metrics::counter!("dispatcher.messages.failed_total").increment(1);
            return Outcome::Unconfirmed;
        }
        Err(e) => {
            error!(error = %e, "Delivery failed, message stays unsent");
            metrics::counter!("dispatcher.messages.failed_total").increment(1);
            return Outcome::DeliveryFailed;
        }
    };

    let sent_at = Utc::now();
    metrics::counter!("dispatcher.messages.sent_total").increment(1);
    let recorded = match store.mark_sent(message.id, sent_at).await {
        Ok(()) => true,
        Err(e) => {
            // The provider accepted it; a later cycle may send it again
            error!(error = %e, provider_message_id = %confirmation.message_id, "Failed to mark message sent");
            false
        }
    };

    if let Some(cache) = cache {
        let record = SentConfirmation::new(confirmation.message_id, sent_at);
        let written = match record.to_json() {
            Ok(value) => cache.set(&confirmation_key(message.id), &value, None).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            warn!(error = %e, "Failed to cache delivery confirmation");
            metrics::counter!("dispatcher.cache.errors_total").increment(1);
        }
    }

    debug!(recorded, "Message dispatched");
    Outcome::Sent { recorded }
}
