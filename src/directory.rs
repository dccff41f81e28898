//! Server directory: snapshot model, merge, and lookup indexes.
//!
//! The backend periodically publishes a directory snapshot (per-protocol
//! server lists plus a config block). Snapshots are untrusted and may be
//! partial, so a merge never fails: missing substructure degrades to empty
//! collections and malformed entries are dropped with a diagnostic.
//!
//! A merge replaces the directory wholesale. The only state that survives
//! across merges is measured latency, carried forward by gateway/hostname
//! identity; everything else reflects the newest snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ping::PingQuality;
use crate::ports::{self, PortSpec, RawPortDescriptor};

/// Tunneling protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VpnType {
    #[default]
    #[serde(rename = "wireguard")]
    WireGuard,
    #[serde(rename = "openvpn")]
    OpenVpn,
}

impl std::fmt::Display for VpnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VpnType::WireGuard => write!(f, "WireGuard"),
            VpnType::OpenVpn => write!(f, "OpenVPN"),
        }
    }
}

// ── Raw snapshot (wire shape) ───────────────────────────────────────────────

/// A directory snapshot as published by the backend.
///
/// Every field is defaulted: a partial snapshot deserializes to empty
/// collections instead of failing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub wireguard: Vec<RawServer>,
    #[serde(default)]
    pub openvpn: Vec<RawServer>,
    #[serde(default)]
    pub config: RawDirectoryConfig,
}

impl RawSnapshot {
    /// Parse a snapshot from raw JSON text.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawServer {
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub hosts: Vec<RawHost>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHost {
    #[serde(default)]
    pub hostname: String,
    /// Connectable address; the wire field is `host`.
    #[serde(default, rename = "host")]
    pub address: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub local_ip: String,
    #[serde(default)]
    pub ipv6: Option<RawHostIpv6>,
    #[serde(default)]
    pub multihop_port: u16,
    #[serde(default)]
    pub load: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHostIpv6 {
    #[serde(default)]
    pub local_ip: String,
    #[serde(default)]
    pub multihop_port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDirectoryConfig {
    #[serde(default)]
    pub antitracker: RawAntitracker,
    #[serde(default)]
    pub api: RawApi,
    #[serde(default)]
    pub ports: RawPortCatalogs,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAntitracker {
    #[serde(default)]
    pub default: RawAntitrackerDns,
    #[serde(default)]
    pub hardcore: RawAntitrackerDns,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAntitrackerDns {
    #[serde(default)]
    pub ip: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawApi {
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub ipv6s: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPortCatalogs {
    #[serde(default)]
    pub wireguard: Vec<RawPortDescriptor>,
    #[serde(default)]
    pub openvpn: Vec<RawPortDescriptor>,
}

// ── Directory model ─────────────────────────────────────────────────────────

/// IPv6 endpoint of a host. Present only when the snapshot carried a
/// non-empty IPv6 address for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostIpv6 {
    pub address: String,
    pub multihop_port: u16,
}

/// One connectable endpoint of a server location. Identity key: hostname.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Host {
    pub hostname: String,
    pub address: String,
    pub public_key: String,
    pub ipv6: Option<HostIpv6>,
    pub multihop_port: u16,
    pub load: f64,
    pub ping: Option<u32>,
    pub ping_quality: PingQuality,
}

impl Host {
    fn from_raw(raw: RawHost) -> Self {
        let ipv6 = raw
            .ipv6
            .filter(|v| !v.local_ip.is_empty())
            .map(|v| HostIpv6 {
                address: v.local_ip,
                multihop_port: v.multihop_port,
            });
        Host {
            hostname: raw.hostname,
            address: raw.address,
            public_key: raw.public_key,
            ipv6,
            multihop_port: raw.multihop_port,
            load: raw.load,
            ping: None,
            ping_quality: PingQuality::Unknown,
        }
    }
}

/// One server location (gateway). Identity key: gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerLocation {
    pub gateway: String,
    pub country_code: String,
    pub country: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub supports_ipv6: bool,
    pub ping: Option<u32>,
    pub ping_quality: PingQuality,
    /// Non-empty: hostless locations are dropped at merge.
    pub hosts: Vec<Host>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AntitrackerConfig {
    pub default_ip: String,
    pub hardcore_ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiConfig {
    pub ips: Vec<String>,
    pub ipv6s: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirectoryConfig {
    pub antitracker: AntitrackerConfig,
    pub api: ApiConfig,
    pub wireguard_ports: Vec<PortSpec>,
    pub openvpn_ports: Vec<PortSpec>,
}

impl DirectoryConfig {
    pub fn ports_for(&self, vpn_type: VpnType) -> &[PortSpec] {
        match vpn_type {
            VpnType::WireGuard => &self.wireguard_ports,
            VpnType::OpenVpn => &self.openvpn_ports,
        }
    }

    /// The antitracker DNS address for the requested mode, if configured.
    pub fn antitracker_ip(&self, hardcore: bool) -> Option<&str> {
        let ip = if hardcore {
            &self.antitracker.hardcore_ip
        } else {
            &self.antitracker.default_ip
        };
        if ip.is_empty() {
            None
        } else {
            Some(ip)
        }
    }
}

/// The full in-memory mirror of available servers plus protocol config.
///
/// Per-protocol lists are sorted ascending by `(country_code, city)` using
/// ordinal comparison; that order is the canonical iteration order for
/// selection tie-breaking.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    pub wireguard: Vec<ServerLocation>,
    pub openvpn: Vec<ServerLocation>,
    pub config: DirectoryConfig,
    by_gateway: HashMap<String, (VpnType, usize)>,
    by_hostname: HashMap<String, (VpnType, usize, usize)>,
}

impl Directory {
    /// Merge an incoming snapshot over the previous directory.
    ///
    /// Returns a new directory value; `previous` is never mutated. Measured
    /// latency is carried forward for servers/hosts that still exist in the
    /// new snapshot (matched by gateway/hostname); entries absent from the
    /// snapshot are dropped.
    pub fn merge(previous: &Directory, incoming: RawSnapshot) -> Directory {
        let mut directory = Directory {
            wireguard: build_locations(incoming.wireguard),
            openvpn: build_locations(incoming.openvpn),
            config: build_config(incoming.config),
            by_gateway: HashMap::new(),
            by_hostname: HashMap::new(),
        };

        directory.wireguard.sort_by(location_order);
        directory.openvpn.sort_by(location_order);
        directory.rebuild_indexes();
        directory.carry_forward(previous);
        directory
    }

    pub fn is_empty(&self) -> bool {
        self.wireguard.is_empty() && self.openvpn.is_empty()
    }

    pub fn servers_for(&self, vpn_type: VpnType) -> &[ServerLocation] {
        match vpn_type {
            VpnType::WireGuard => &self.wireguard,
            VpnType::OpenVpn => &self.openvpn,
        }
    }

    /// The server list a connection may currently target.
    ///
    /// OpenVPN returns its full list (IPv6 inside the tunnel is not
    /// available there, so the preference does not apply); WireGuard
    /// restricts to IPv6-capable locations when `require_ipv6` is set.
    pub fn active_servers(&self, vpn_type: VpnType, require_ipv6: bool) -> Vec<&ServerLocation> {
        match vpn_type {
            VpnType::OpenVpn => self.openvpn.iter().collect(),
            VpnType::WireGuard if require_ipv6 => self
                .wireguard
                .iter()
                .filter(|s| s.supports_ipv6)
                .collect(),
            VpnType::WireGuard => self.wireguard.iter().collect(),
        }
    }

    pub fn server_by_gateway(&self, gateway: &str) -> Option<&ServerLocation> {
        let &(vpn_type, index) = self.by_gateway.get(gateway)?;
        self.servers_for(vpn_type).get(index)
    }

    pub fn host_by_hostname(&self, hostname: &str) -> Option<&Host> {
        let &(vpn_type, server, host) = self.by_hostname.get(hostname)?;
        self.servers_for(vpn_type).get(server)?.hosts.get(host)
    }

    fn rebuild_indexes(&mut self) {
        self.by_gateway.clear();
        self.by_hostname.clear();
        for vpn_type in [VpnType::WireGuard, VpnType::OpenVpn] {
            let servers = match vpn_type {
                VpnType::WireGuard => &self.wireguard,
                VpnType::OpenVpn => &self.openvpn,
            };
            for (si, server) in servers.iter().enumerate() {
                self.by_gateway.insert(server.gateway.clone(), (vpn_type, si));
                for (hi, host) in server.hosts.iter().enumerate() {
                    self.by_hostname
                        .insert(host.hostname.clone(), (vpn_type, si, hi));
                }
            }
        }
    }

    fn location_mut(&mut self, vpn_type: VpnType, index: usize) -> &mut ServerLocation {
        match vpn_type {
            VpnType::WireGuard => &mut self.wireguard[index],
            VpnType::OpenVpn => &mut self.openvpn[index],
        }
    }

    fn carry_forward(&mut self, previous: &Directory) {
        for prev in previous.wireguard.iter().chain(previous.openvpn.iter()) {
            if let Some((vpn_type, index)) = self.by_gateway.get(&prev.gateway).copied() {
                let server = self.location_mut(vpn_type, index);
                server.ping = prev.ping;
                server.ping_quality = prev.ping_quality;
            }
            for prev_host in &prev.hosts {
                if let Some((vpn_type, si, hi)) =
                    self.by_hostname.get(&prev_host.hostname).copied()
                {
                    let host = &mut self.location_mut(vpn_type, si).hosts[hi];
                    host.ping = prev_host.ping;
                    host.ping_quality = prev_host.ping_quality;
                }
            }
        }
    }
}

fn location_order(a: &ServerLocation, b: &ServerLocation) -> std::cmp::Ordering {
    a.country_code
        .cmp(&b.country_code)
        .then_with(|| a.city.cmp(&b.city))
}

fn build_locations(raw: Vec<RawServer>) -> Vec<ServerLocation> {
    raw.into_iter()
        .filter_map(|server| {
            if server.hosts.is_empty() {
                log::warn!(
                    "dropping server location '{}' from snapshot: no hosts",
                    server.gateway
                );
                return None;
            }
            let hosts: Vec<Host> = server.hosts.into_iter().map(Host::from_raw).collect();
            let supports_ipv6 = hosts.iter().any(|h| h.ipv6.is_some());
            Some(ServerLocation {
                gateway: server.gateway,
                country_code: server.country_code,
                country: server.country,
                city: server.city,
                latitude: server.latitude,
                longitude: server.longitude,
                supports_ipv6,
                ping: None,
                ping_quality: PingQuality::Unknown,
                hosts,
            })
        })
        .collect()
}

fn build_config(raw: RawDirectoryConfig) -> DirectoryConfig {
    DirectoryConfig {
        antitracker: AntitrackerConfig {
            default_ip: raw.antitracker.default.ip,
            hardcore_ip: raw.antitracker.hardcore.ip,
        },
        api: ApiConfig {
            ips: raw.api.ips,
            ipv6s: raw.api.ipv6s,
        },
        wireguard_ports: normalize_catalog(&raw.ports.wireguard, "wireguard"),
        openvpn_ports: normalize_catalog(&raw.ports.openvpn, "openvpn"),
    }
}

fn normalize_catalog(raw: &[RawPortDescriptor], protocol: &str) -> Vec<PortSpec> {
    let catalog: Vec<PortSpec> = raw.iter().filter_map(ports::normalize).collect();
    if catalog.len() < raw.len() {
        log::warn!(
            "dropped {} malformed {} port descriptor(s) from snapshot",
            raw.len() - catalog.len(),
            protocol
        );
    }
    catalog
}
