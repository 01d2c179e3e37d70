//! Message Dispatcher
//!
//! Drives the batch processor on a fixed period. The first cycle runs as soon
//! as the loop starts. While paused the loop parks on the gate; on resume it
//! runs a cycle straight away and the period restarts from there.
//!
//! In-flight work is never cancelled: a pause only takes effect at the top of
//! the next iteration.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::ConfirmationCache;
use crate::delivery::DeliveryClient;
use crate::error::{DispatchError, Result};
use crate::gate::PauseGate;
use crate::processor::{BatchProcessor, CycleReport};
use crate::store::MessageStore;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum messages handled per cycle
    pub batch_size: u32,
    /// Time between the starts of consecutive cycles
    pub period: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 2,
            period: Duration::from_secs(120),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DispatchError::Config("batch_size must be positive".to_string()));
        }
        if self.period.is_zero() {
            return Err(DispatchError::Config("period must be positive".to_string()));
        }
        Ok(())
    }
}

/// Pause/resume control exposed to the HTTP control plane
pub trait DispatchControl: Send + Sync {
    /// Returns `true` if the dispatcher was running and is now paused.
    fn pause(&self) -> bool;

    /// Returns `true` if the dispatcher was paused and is now running.
    fn resume(&self) -> bool;

    fn is_paused(&self) -> bool;
}

pub struct MessageDispatcher {
    processor: BatchProcessor,
    gate: PauseGate,
    config: DispatcherConfig,
}

impl MessageDispatcher {
    pub fn new(
        store: Arc<dyn MessageStore>,
        client: Arc<dyn DeliveryClient>,
        cache: Option<Arc<dyn ConfirmationCache>>,
        config: DispatcherConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            processor: BatchProcessor::new(store, client, cache, config.batch_size),
            gate: PauseGate::new(),
            config,
        })
    }

    pub fn pause(&self) -> bool {
        self.gate.pause()
    }

    pub fn resume(&self) -> bool {
        self.gate.resume()
    }

    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    /// Run a single cycle outside the periodic loop
    pub async fn run_cycle(&self) -> CycleReport {
        self.processor.run_cycle().await
    }

    /// Run the dispatch loop forever
    pub async fn run(&self) {
        info!(
            batch_size = self.config.batch_size,
            period_secs = self.config.period.as_secs(),
            "Starting message dispatcher"
        );
        metrics::gauge!("dispatcher.batch_size").set(self.config.batch_size as f64);

        let mut ticker = interval(self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            if self.gate.wait_until_running().await {
                ticker.reset();
            }

            self.processor.run_cycle().await;

            ticker.tick().await;
            debug!("Dispatch tick");
        }
    }

    /// Spawn the dispatch loop onto the runtime
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}

impl DispatchControl for MessageDispatcher {
    fn pause(&self) -> bool {
        MessageDispatcher::pause(self)
    }

    fn resume(&self) -> bool {
        MessageDispatcher::resume(self)
    }

    fn is_paused(&self) -> bool {
        MessageDispatcher::is_paused(self)
    }
}
