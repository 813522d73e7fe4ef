//! Active probe sweep
//!
//! Asks a bounded set of `host:port` candidates for the cast setup API's
//! `eureka_info`. Probes run concurrently; each one that looks like a cast
//! receiver is upserted straight into the registry.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::debug;
use tvskip_state::{Device, DeviceRegistry};

use crate::config::DiscoveryConfig;
use crate::device::{device_from_probe, is_cast_setup_reply};
use crate::error::{DiscoveryError, Result};

const SETUP_INFO_PATH: &str = "/setup/eureka_info";

/// Probe one candidate
pub async fn probe(http: &reqwest::Client, addr: SocketAddr, timeout: Duration) -> Result<Device> {
    let url = format!("http://{}{}", addr, SETUP_INFO_PATH);
    let response = http.get(&url).timeout(timeout).send().await?;

    if !response.status().is_success() {
        return Err(DiscoveryError::InvalidDevice(format!(
            "{} answered HTTP {}",
            addr,
            response.status().as_u16()
        )));
    }

    let body = response.text().await?;
    if !is_cast_setup_reply(&body) {
        return Err(DiscoveryError::InvalidDevice(format!("{} is not a cast receiver", addr)));
    }

    Ok(device_from_probe(addr.ip(), addr.port(), &body))
}

/// Probe every candidate, upserting hits as they complete
///
/// `found` is bumped once per hit so a cut-off sweep still reports progress.
/// Dropping the returned future aborts all outstanding probes.
pub async fn sweep(
    http: reqwest::Client,
    config: &DiscoveryConfig,
    registry: DeviceRegistry,
    found: Arc<AtomicUsize>,
) {
    let mut probes = JoinSet::new();

    for addr in config.probe_candidates() {
        let http = http.clone();
        let registry = registry.clone();
        let found = Arc::clone(&found);
        let timeout = config.probe_timeout;

        probes.spawn(async move {
            match probe(&http, addr, timeout).await {
                Ok(device) => {
                    debug!(%addr, device_id = %device.id, "probe found receiver");
                    registry.upsert(device);
                    found.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => debug!(%addr, error = %e, "probe miss"),
            }
        });
    }

    while let Some(joined) = probes.join_next().await {
        if let Err(e) = joined {
            debug!(error = %e, "probe task failed");
        }
    }
}
