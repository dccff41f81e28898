//! Latency probe application and quality tiers.
//!
//! Probe batches arrive from the external prober as `{host, ping}` pairs
//! keyed by host address. Applying a batch updates the matching hosts and
//! recomputes each location's aggregate from its best host.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::directory::Directory;

/// Quality tier derived from a measured latency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PingQuality {
    #[default]
    Unknown,
    Good,
    Moderate,
    Bad,
}

/// One latency probe result for a host address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingMeasurement {
    #[serde(rename = "Host")]
    pub address: String,
    #[serde(rename = "Ping")]
    pub ms: u32,
}

/// Tier thresholds: under 100ms is good, under 300ms moderate, else bad.
pub fn quality_of(ms: u32) -> PingQuality {
    if ms < 100 {
        PingQuality::Good
    } else if ms < 300 {
        PingQuality::Moderate
    } else {
        PingQuality::Bad
    }
}

/// Apply a probe batch onto the directory.
///
/// Hosts are matched by address; measurements for unknown addresses are
/// ignored. After the per-host updates every location's aggregate ping is
/// recomputed as the minimum non-null host ping, and its quality tier is
/// derived from that fresh aggregate. Locations with no measured host keep
/// their prior aggregate.
pub fn apply(directory: &mut Directory, measurements: &[PingMeasurement]) {
    if measurements.is_empty() {
        return;
    }

    let by_address: HashMap<&str, u32> = measurements
        .iter()
        .map(|m| (m.address.as_str(), m.ms))
        .collect();

    let mut matched = 0usize;
    for server in directory
        .wireguard
        .iter_mut()
        .chain(directory.openvpn.iter_mut())
    {
        for host in &mut server.hosts {
            if let Some(&ms) = by_address.get(host.address.as_str()) {
                host.ping = Some(ms);
                host.ping_quality = quality_of(ms);
                matched += 1;
            }
        }

        if let Some(best) = server.hosts.iter().filter_map(|h| h.ping).min() {
            server.ping = Some(best);
            server.ping_quality = quality_of(best);
        }
    }

    log::debug!(
        "applied ping batch: {} measurement(s), {} host update(s)",
        measurements.len(),
        matched
    );
}
