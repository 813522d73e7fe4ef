//! Discovery engine
//!
//! A run launches two strategies side by side and cuts both off when the
//! window closes:
//!
//! 1. SSDP: one M-SEARCH for DIAL receivers, replies read until the SSDP
//!    timeout, descriptors fetched concurrently as replies arrive
//! 2. Probe sweep: `GET /setup/eureka_info` against a bounded candidate set
//!
//! Both write into the [`DeviceRegistry`]. A run never fails; at worst it
//! finds nothing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info};
use tvskip_state::DeviceRegistry;

use crate::config::DiscoveryConfig;
use crate::device::{device_from_descriptor, DeviceDescription};
use crate::error::{DiscoveryError, Result};
use crate::probe;
use crate::ssdp::SsdpClient;

/// Outcome of a finished or cancelled run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverySummary {
    /// Devices upserted by the SSDP strategy
    pub ssdp_devices: usize,
    /// Devices upserted by the probe sweep
    pub probe_devices: usize,
    pub elapsed: Duration,
    /// The window closed before both strategies finished
    pub timed_out: bool,
    pub cancelled: bool,
}

impl DiscoverySummary {
    pub fn total(&self) -> usize {
        self.ssdp_devices + self.probe_devices
    }
}

#[derive(Debug, Default)]
struct RunCounters {
    ssdp: Arc<AtomicUsize>,
    probe: Arc<AtomicUsize>,
    timed_out: AtomicBool,
}

/// Handle to a running discovery
pub struct DiscoveryRun {
    handle: JoinHandle<()>,
    counters: Arc<RunCounters>,
    started: Instant,
}

impl DiscoveryRun {
    /// Abort the run and every outstanding request
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Handle that can cancel the run after `wait` has taken ownership
    pub fn abort_handle(&self) -> tokio::task::AbortHandle {
        self.handle.abort_handle()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to end and summarize it
    pub async fn wait(self) -> DiscoverySummary {
        let cancelled = match self.handle.await {
            Ok(()) => false,
            Err(e) => e.is_cancelled(),
        };

        DiscoverySummary {
            ssdp_devices: self.counters.ssdp.load(Ordering::Relaxed),
            probe_devices: self.counters.probe.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
            cancelled,
        }
    }
}

impl std::fmt::Debug for DiscoveryRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryRun")
            .field("finished", &self.is_finished())
            .field("elapsed", &self.started.elapsed())
            .finish()
    }
}

/// Populates a [`DeviceRegistry`] from the local network
#[derive(Debug, Clone)]
pub struct DiscoveryEngine {
    config: DiscoveryConfig,
    registry: DeviceRegistry,
    http: reqwest::Client,
}

impl DiscoveryEngine {
    pub fn new(config: DiscoveryConfig, registry: DeviceRegistry) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            registry,
            http,
        })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Launch a run on the current Tokio runtime and return immediately
    pub fn start(&self) -> DiscoveryRun {
        let counters = Arc::new(RunCounters::default());
        let started = Instant::now();
        let engine = self.clone();
        let run_counters = Arc::clone(&counters);

        let handle = tokio::spawn(async move {
            info!(window_ms = engine.config.window.as_millis() as u64, "discovery started");

            let strategies = async {
                tokio::join!(
                    engine.ssdp_strategy(Arc::clone(&run_counters.ssdp)),
                    engine.probe_strategy(Arc::clone(&run_counters.probe)),
                )
            };

            if tokio::time::timeout(engine.config.window, strategies).await.is_err() {
                run_counters.timed_out.store(true, Ordering::Relaxed);
            }

            info!(
                ssdp = run_counters.ssdp.load(Ordering::Relaxed),
                probe = run_counters.probe.load(Ordering::Relaxed),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "discovery finished"
            );
        });

        DiscoveryRun {
            handle,
            counters,
            started,
        }
    }

    /// Run to completion
    pub async fn run(&self) -> DiscoverySummary {
        self.start().wait().await
    }

    async fn ssdp_strategy(&self, found: Arc<AtomicUsize>) {
        if !self.config.enable_ssdp {
            return;
        }

        let client = match SsdpClient::bind().await {
            Ok(client) => client,
            Err(e) => {
                debug!(error = %e, "ssdp unavailable");
                return;
            }
        };

        if let Err(e) = client
            .search(self.config.ssdp_target, &self.config.search_target, self.config.mx)
            .await
        {
            debug!(error = %e, "ssdp search failed");
            return;
        }

        let deadline = Instant::now() + self.config.ssdp_timeout;
        let mut seen = HashSet::new();
        let mut fetches = JoinSet::new();

        while let Some(reply) = client.recv_until(deadline).await {
            if !seen.insert(reply.location.clone()) {
                continue;
            }

            let http = self.http.clone();
            let registry = self.registry.clone();
            let found = Arc::clone(&found);
            let timeout = self.config.descriptor_timeout;

            fetches.spawn(async move {
                match fetch_descriptor(&http, &reply.location, timeout).await {
                    Ok(description) => {
                        if let Some(device) = device_from_descriptor(&reply.location, description.as_ref()) {
                            debug!(device_id = %device.id, location = %reply.location, "ssdp found receiver");
                            registry.upsert(device);
                            found.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Err(e) => debug!(location = %reply.location, error = %e, "descriptor fetch failed"),
                }
            });
        }

        while let Some(joined) = fetches.join_next().await {
            if let Err(e) = joined {
                debug!(error = %e, "descriptor task failed");
            }
        }
    }

    async fn probe_strategy(&self, found: Arc<AtomicUsize>) {
        if !self.config.enable_probe {
            return;
        }
        probe::sweep(self.http.clone(), &self.config, self.registry.clone(), found).await;
    }
}

/// Fetch a descriptor; `Ok(None)` means it was fetched but did not parse
async fn fetch_descriptor(
    http: &reqwest::Client,
    location: &str,
    timeout: Duration,
) -> Result<Option<DeviceDescription>> {
    let started = Instant::now();
    let response = http.get(location).timeout(timeout).send().await?;

    if !response.status().is_success() {
        return Err(DiscoveryError::NetworkError(format!(
            "descriptor fetch returned HTTP {}",
            response.status().as_u16()
        )));
    }

    let xml = response.text().await?;
    debug!(
        location,
        latency_ms = started.elapsed().as_millis() as u64,
        "descriptor fetched"
    );

    match DeviceDescription::from_xml(&xml) {
        Ok(description) => Ok(Some(description)),
        Err(e) => {
            debug!(location, error = %e, "descriptor did not parse");
            Ok(None)
        }
    }
}
