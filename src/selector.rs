//! Fastest-server selection.
//!
//! Picks the best candidate from an already-ordered server list: measured
//! latency wins, geographic proximity to the last known location is the
//! fallback when nothing has been measured yet, and the first non-excluded
//! candidate backstops everything.

use serde::{Deserialize, Serialize};

use crate::directory::{Directory, ServerLocation};
use crate::settings::SettingsPort;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic position, latitude/longitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Gateway identity with any sub-identifier suffix stripped
/// (`de.wg.skyhop.net` → `de`).
fn gateway_id(gateway: &str) -> &str {
    gateway.split('.').next().unwrap_or(gateway)
}

/// Pick the fastest server from `candidates`, scanned in their given order.
///
/// A candidate is excluded when its stripped gateway id matches any excluded
/// entry's stripped id. The non-excluded candidate with the smallest
/// strictly-positive ping wins; with no ping data the candidate nearest to
/// `last_known_location` wins (ties broken by input order); failing that,
/// the first non-excluded candidate. Returns `None` when the list is empty
/// or fully excluded.
pub fn pick_fastest<'a>(
    candidates: &[&'a ServerLocation],
    excluded_gateways: &[String],
    last_known_location: Option<Coordinates>,
) -> Option<&'a ServerLocation> {
    let excluded: Vec<&str> = excluded_gateways.iter().map(|g| gateway_id(g)).collect();

    let mut fallback: Option<&ServerLocation> = None;
    let mut best: Option<(u32, &ServerLocation)> = None;
    let mut eligible: Vec<&ServerLocation> = Vec::new();

    for &server in candidates {
        if excluded.contains(&gateway_id(&server.gateway)) {
            continue;
        }
        if fallback.is_none() {
            fallback = Some(server);
        }
        eligible.push(server);

        if let Some(ping) = server.ping.filter(|&ms| ms > 0) {
            if best.map_or(true, |(best_ms, _)| ping < best_ms) {
                best = Some((ping, server));
            }
        }
    }

    if let Some((_, server)) = best {
        return Some(server);
    }

    if let Some(origin) = last_known_location {
        if let Some(nearest) = nearest_to(&eligible, origin) {
            return Some(nearest);
        }
    }

    fallback
}

/// The eligible candidate nearest to `origin`, or `None` when any distance
/// is undefined (the caller then falls back to first-candidate order).
fn nearest_to<'a>(candidates: &[&'a ServerLocation], origin: Coordinates) -> Option<&'a ServerLocation> {
    let mut scored: Vec<(f64, &ServerLocation)> = Vec::with_capacity(candidates.len());
    for &server in candidates {
        let distance = distance_km(origin, server.latitude, server.longitude);
        if !distance.is_finite() {
            log::debug!(
                "distance to '{}' is undefined, skipping nearest-server fallback",
                server.gateway
            );
            return None;
        }
        scored.push((distance, server));
    }
    // stable sort keeps input order for equal distances
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.first().map(|&(_, server)| server)
}

/// Great-circle distance in kilometers (haversine).
pub fn distance_km(origin: Coordinates, latitude: f64, longitude: f64) -> f64 {
    let d_lat = (latitude - origin.latitude).to_radians();
    let d_lon = (longitude - origin.longitude).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + origin.latitude.to_radians().cos()
            * latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Pick the fastest server for the currently configured protocol, wiring the
/// active server list, exclusion list and last known location from the
/// settings collaborator.
pub fn fastest_server<'a>(
    directory: &'a Directory,
    settings: &dyn SettingsPort,
) -> Option<&'a ServerLocation> {
    let vpn_type = settings.vpn_type();
    let require_ipv6 = settings.enable_ipv6_in_tunnel() && !settings.show_gateways_without_ipv6();
    let candidates = directory.active_servers(vpn_type, require_ipv6);
    pick_fastest(
        &candidates,
        &settings.fastest_excluded_gateways(),
        settings.last_known_location(),
    )
}
