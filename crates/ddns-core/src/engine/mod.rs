//! Core DDNS engine
//!
//! The DdnsEngine is the driver loop. On a fixed interval it:
//! - Discovers the host's current addresses via the ResolverPool
//! - Hands them to the Reconciler together with the desired records
//! - Reports what happened as [`EngineEvent`]s
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  AddressSet  ┌──────────────┐  upserts  ┌─────────────┐
//! │ ResolverPool │─────────────►│  Reconciler  │──────────►│ RecordStore │
//! └──────────────┘              └──────────────┘           └─────────────┘
//!         ▲                             │
//!         └────────── DdnsEngine ───────┴──► EngineEvent channel
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Resolve the discovery domain
//! 2. On failure, log and wait for the next interval (nothing is reconciled)
//! 3. Otherwise reconcile every zone; zone failures do not affect other zones
//! 4. Sleep for the interval, or stop if shutdown was requested

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::DdnsConfig;
use crate::error::Result;
use crate::model::{AddressSet, DesiredState};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::resolver::ResolverPool;

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        zones_count: usize,
        names_count: usize,
    },

    /// Discovery produced the current address set
    AddressesDiscovered { addresses: AddressSet },

    /// Discovery failed; this cycle reconciles nothing
    DiscoveryFailed { error: String },

    /// Zone needed no write
    ZoneUpToDate { zone: String },

    /// Zone received one upsert batch
    ZoneUpdated { zone: String, names: Vec<String> },

    /// Zone could not be reconciled this cycle
    ZoneFailed { zone: String, error: String },

    /// A cycle finished (successfully or not)
    CycleCompleted { cycle: u64 },

    /// Engine stopped
    Stopped { reason: String },
}

/// Core DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Start with [`DdnsEngine::run_until()`]
/// 3. The engine cycles until the shutdown future completes
///
/// ## Threading
///
/// Cycles are strictly sequential: the next one does not begin until every
/// network call of the previous one has returned. Shutdown is only observed
/// between cycles, so an in-flight cycle always runs to completion.
pub struct DdnsEngine {
    /// Address discovery
    pool: ResolverPool,

    /// Zone reconciliation
    reconciler: Reconciler,

    /// Name queried for discovery
    domain: String,

    /// Records to manage
    desired: DesiredState,

    /// TTL written to managed records
    ttl: u32,

    /// Delay between cycles
    interval: Duration,

    /// Completed cycles
    cycles: u64,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        pool: ResolverPool,
        reconciler: Reconciler,
        config: &DdnsConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            pool,
            reconciler,
            domain: config.domain.clone(),
            desired: DesiredState::from_zones(&config.zones),
            ttl: config.ttl_secs()?,
            interval: config.interval()?,
            cycles: 0,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Records managed by this engine
    pub fn desired(&self) -> &DesiredState {
        &self.desired
    }

    /// Run until `shutdown` completes
    ///
    /// The first cycle starts immediately. `shutdown` is only raced against
    /// the sleep between cycles.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.emit_event(EngineEvent::Started {
            zones_count: self.desired.zone_count(),
            names_count: self.desired.all_names().count(),
        });
        info!(
            "Monitoring for {}",
            self.desired.all_names().collect::<Vec<_>>().join(", ")
        );

        tokio::pin!(shutdown);

        loop {
            self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        info!("Engine stopped after {} cycle(s)", self.cycles);
        Ok(())
    }

    /// Run until `shutdown_rx` fires or its sender is dropped
    pub async fn run_with_shutdown(&mut self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.run_until(async {
            let _ = shutdown_rx.await;
        })
        .await
    }

    /// Perform one discovery + reconciliation cycle
    ///
    /// Never fails: every error is logged, emitted as an event and left for
    /// the next cycle to retry.
    pub async fn run_cycle(&mut self) -> Option<ReconcileReport> {
        self.cycles += 1;
        debug!("Starting cycle {}", self.cycles);

        let report = match self.pool.resolve(&self.domain).await {
            Ok(addresses) => {
                debug!("My IPs {}", addresses);
                self.emit_event(EngineEvent::AddressesDiscovered {
                    addresses: addresses.clone(),
                });

                let report = self
                    .reconciler
                    .reconcile(&self.desired, self.ttl, &addresses)
                    .await;
                self.emit_report(&report);
                Some(report)
            }
            Err(e) => {
                error!("Could not find my IP via {}: {}", self.domain, e);
                self.emit_event(EngineEvent::DiscoveryFailed {
                    error: e.to_string(),
                });
                None
            }
        };

        self.emit_event(EngineEvent::CycleCompleted { cycle: self.cycles });
        report
    }

    fn emit_report(&self, report: &ReconcileReport) {
        for zone in &report.up_to_date {
            self.emit_event(EngineEvent::ZoneUpToDate { zone: zone.clone() });
        }
        for zone in report.applied.zones() {
            let names = report
                .applied
                .names(zone)
                .map(|names| names.iter().cloned().collect())
                .unwrap_or_default();
            self.emit_event(EngineEvent::ZoneUpdated {
                zone: zone.to_string(),
                names,
            });
        }
        for (zone, e) in &report.failures {
            self.emit_event(EngineEvent::ZoneFailed {
                zone: zone.clone(),
                error: e.to_string(),
            });
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Dropped rather than awaited so a slow consumer never stalls a cycle
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "Event channel full, dropping event. Consider increasing event_channel_capacity."
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Event receiver dropped, event discarded");
            }
        }
    }
}

impl std::fmt::Debug for DdnsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdnsEngine")
            .field("pool", &self.pool)
            .field("reconciler", &self.reconciler)
            .field("domain", &self.domain)
            .field("ttl", &self.ttl)
            .field("interval", &self.interval)
            .field("cycles", &self.cycles)
            .finish()
    }
}
