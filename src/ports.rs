//! Port catalog: normalization and validation of connection port descriptors.
//!
//! The backend ships port catalogs as loosely-typed descriptors (a transport
//! name plus a single port, a range, or both). Everything downstream works on
//! the canonical [`PortSpec`] form produced here.
//!
//! Protocol policy (WireGuard is UDP-only, obfsproxy forces TCP) lives in
//! [`applicable_ports`], not in the normalization primitives.

use serde::{Deserialize, Serialize};

use crate::directory::VpnType;

/// Transport of a connection port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transport {
    #[serde(rename = "UDP")]
    Udp,
    #[serde(rename = "TCP")]
    Tcp,
}

/// Canonical port descriptor: a concrete port or an allowed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortSpec {
    Single { transport: Transport, port: u16 },
    Range { transport: Transport, min: u16, max: u16 },
}

impl PortSpec {
    pub fn transport(&self) -> Transport {
        match *self {
            PortSpec::Single { transport, .. } | PortSpec::Range { transport, .. } => transport,
        }
    }

    /// The concrete port, when this spec is a single port.
    pub fn single_port(&self) -> Option<u16> {
        match *self {
            PortSpec::Single { port, .. } => Some(port),
            PortSpec::Range { .. } => None,
        }
    }

    /// Widen to a range; a single port becomes the degenerate range `[p, p]`.
    pub fn widened(&self) -> PortSpec {
        match *self {
            PortSpec::Single { transport, port } => PortSpec::Range {
                transport,
                min: port,
                max: port,
            },
            range @ PortSpec::Range { .. } => range,
        }
    }
}

/// Wire shape of a port descriptor as the backend sends it.
///
/// All fields optional: entries may carry a single `port`, a `range`, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPortDescriptor {
    #[serde(default, rename = "type")]
    pub transport: Option<String>,
    #[serde(default)]
    pub port: Option<u32>,
    #[serde(default)]
    pub range: Option<RawPortRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPortRange {
    pub min: u32,
    pub max: u32,
}

impl From<PortSpec> for RawPortDescriptor {
    fn from(spec: PortSpec) -> Self {
        let transport = match spec.transport() {
            Transport::Udp => "UDP",
            Transport::Tcp => "TCP",
        };
        match spec {
            PortSpec::Single { port, .. } => RawPortDescriptor {
                transport: Some(transport.to_string()),
                port: Some(u32::from(port)),
                range: None,
            },
            PortSpec::Range { min, max, .. } => RawPortDescriptor {
                transport: Some(transport.to_string()),
                port: None,
                range: Some(RawPortRange {
                    min: u32::from(min),
                    max: u32::from(max),
                }),
            },
        }
    }
}

fn parse_transport(raw: &RawPortDescriptor) -> Option<Transport> {
    match raw.transport.as_deref() {
        Some(s) if s.eq_ignore_ascii_case("udp") => Some(Transport::Udp),
        Some(s) if s.eq_ignore_ascii_case("tcp") => Some(Transport::Tcp),
        _ => None,
    }
}

/// Canonicalize a raw descriptor.
///
/// Returns `None` when the transport is missing/unrecognized, the port is
/// zero or out of the 16-bit range, or range bounds are inverted. A single
/// port wins over a range when an entry carries both. Idempotent over its
/// own output.
pub fn normalize(raw: &RawPortDescriptor) -> Option<PortSpec> {
    let transport = parse_transport(raw)?;

    if let Some(port) = raw.port {
        if port == 0 || port > u32::from(u16::MAX) {
            return None;
        }
        return Some(PortSpec::Single {
            transport,
            port: port as u16,
        });
    }

    if let Some(range) = raw.range {
        if range.min == 0 || range.max > u32::from(u16::MAX) || range.min > range.max {
            return None;
        }
        return Some(PortSpec::Range {
            transport,
            min: range.min as u16,
            max: range.max as u16,
        });
    }

    None
}

/// Canonicalize a raw descriptor into range form (single ports widen to
/// `[p, p]`). Used to build allowed-range tables.
pub fn to_range(raw: &RawPortDescriptor) -> Option<PortSpec> {
    // range entries pass through, single ports widen
    let transport = parse_transport(raw)?;
    if let Some(range) = raw.range {
        if range.min == 0 || range.max > u32::from(u16::MAX) || range.min > range.max {
            return None;
        }
        return Some(PortSpec::Range {
            transport,
            min: range.min as u16,
            max: range.max as u16,
        });
    }
    normalize(raw).map(|spec| spec.widened())
}

/// True when the candidate's transport matches a range entry and its port
/// falls within `[min, max]` inclusive. Range candidates never match.
pub fn contains(ranges: &[PortSpec], candidate: PortSpec) -> bool {
    let (transport, port) = match candidate {
        PortSpec::Single { transport, port } => (transport, port),
        PortSpec::Range { .. } => return false,
    };
    ranges.iter().any(|entry| match *entry {
        PortSpec::Range {
            transport: t,
            min,
            max,
        } => t == transport && port >= min && port <= max,
        PortSpec::Single {
            transport: t,
            port: p,
        } => t == transport && p == port,
    })
}

/// Exact transport+port membership test against a normalized catalog.
/// Not range-based: only `Single` entries can match.
pub fn exists(catalog: &[PortSpec], candidate: PortSpec) -> bool {
    let (transport, port) = match candidate {
        PortSpec::Single { transport, port } => (transport, port),
        PortSpec::Range { .. } => return false,
    };
    catalog.iter().any(|entry| {
        matches!(*entry, PortSpec::Single { transport: t, port: p } if t == transport && p == port)
    })
}

/// Every catalog entry widened into range form.
pub fn allowed_port_ranges(config_ports: &[PortSpec]) -> Vec<PortSpec> {
    config_ports.iter().map(PortSpec::widened).collect()
}

/// The ports a connection may actually use for the given protocol.
///
/// Base catalog entries come first, in configuration order, followed by the
/// user's custom ports. Custom ports are dropped when they duplicate a base
/// entry, use a non-UDP transport on WireGuard, or fall outside every
/// allowed range. With obfsproxy active on OpenVPN only TCP entries remain.
pub fn applicable_ports(
    config_ports: &[PortSpec],
    custom_ports: &[PortSpec],
    vpn_type: VpnType,
    use_obfsproxy: bool,
) -> Vec<PortSpec> {
    let mut ports: Vec<PortSpec> = config_ports
        .iter()
        .copied()
        .filter(|p| p.single_port().is_some())
        .collect();

    let ranges = allowed_port_ranges(config_ports);
    for &custom in custom_ports {
        if custom.single_port().is_none() || exists(&ports, custom) {
            continue;
        }
        if vpn_type == VpnType::WireGuard && custom.transport() != Transport::Udp {
            continue;
        }
        if !contains(&ranges, custom) {
            continue;
        }
        ports.push(custom);
    }

    if vpn_type == VpnType::OpenVpn && use_obfsproxy {
        ports.retain(|p| p.transport() == Transport::Tcp);
    }

    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(transport: &str, port: u32) -> RawPortDescriptor {
        RawPortDescriptor {
            transport: Some(transport.to_string()),
            port: Some(port),
            range: None,
        }
    }

    fn raw_range(transport: &str, min: u32, max: u32) -> RawPortDescriptor {
        RawPortDescriptor {
            transport: Some(transport.to_string()),
            port: None,
            range: Some(RawPortRange { min, max }),
        }
    }

    fn udp(port: u16) -> PortSpec {
        PortSpec::Single {
            transport: Transport::Udp,
            port,
        }
    }

    fn tcp(port: u16) -> PortSpec {
        PortSpec::Single {
            transport: Transport::Tcp,
            port,
        }
    }

    #[test]
    fn normalize_accepts_single_port() {
        assert_eq!(normalize(&raw("UDP", 2049)), Some(udp(2049)));
        assert_eq!(normalize(&raw("tcp", 443)), Some(tcp(443)));
    }

    #[test]
    fn normalize_accepts_range() {
        assert_eq!(
            normalize(&raw_range("UDP", 5500, 19999)),
            Some(PortSpec::Range {
                transport: Transport::Udp,
                min: 5500,
                max: 19999
            })
        );
    }

    #[test]
    fn normalize_rejects_missing_or_unknown_transport() {
        assert_eq!(normalize(&RawPortDescriptor::default()), None);
        assert_eq!(normalize(&raw("SCTP", 2049)), None);
    }

    #[test]
    fn normalize_rejects_invalid_bounds() {
        assert_eq!(normalize(&raw("UDP", 0)), None);
        assert_eq!(normalize(&raw("UDP", 70000)), None);
        assert_eq!(normalize(&raw_range("TCP", 2000, 1000)), None);
        assert_eq!(normalize(&raw_range("TCP", 0, 1000)), None);
    }

    #[test]
    fn normalize_is_idempotent() {
        for descriptor in [raw("UDP", 2049), raw("TCP", 443), raw_range("UDP", 10, 20)] {
            let once = normalize(&descriptor).expect("valid descriptor");
            let twice = normalize(&RawPortDescriptor::from(once));
            assert_eq!(twice, Some(once));
        }
    }

    #[test]
    fn to_range_widens_single_port() {
        assert_eq!(
            to_range(&raw("UDP", 53)),
            Some(PortSpec::Range {
                transport: Transport::Udp,
                min: 53,
                max: 53
            })
        );
    }

    #[test]
    fn to_range_prefers_range_when_both_present() {
        let mut descriptor = raw("UDP", 2049);
        descriptor.range = Some(RawPortRange {
            min: 5500,
            max: 19999,
        });
        assert_eq!(
            to_range(&descriptor),
            Some(PortSpec::Range {
                transport: Transport::Udp,
                min: 5500,
                max: 19999
            })
        );
    }

    #[test]
    fn contains_checks_transport_and_inclusive_bounds() {
        let ranges = vec![PortSpec::Range {
            transport: Transport::Udp,
            min: 100,
            max: 200,
        }];
        assert!(contains(&ranges, udp(100)));
        assert!(contains(&ranges, udp(200)));
        assert!(!contains(&ranges, udp(99)));
        assert!(!contains(&ranges, udp(201)));
        assert!(!contains(&ranges, tcp(150)));
    }

    #[test]
    fn exists_is_exact_membership() {
        let catalog = vec![udp(2049), tcp(443)];
        assert!(exists(&catalog, udp(2049)));
        assert!(!exists(&catalog, tcp(2049)));
        assert!(!exists(&catalog, udp(2050)));
    }

    #[test]
    fn applicable_ports_appends_custom_ports_within_ranges() {
        let config = vec![
            udp(2049),
            PortSpec::Range {
                transport: Transport::Udp,
                min: 5500,
                max: 19999,
            },
        ];
        let custom = vec![udp(6000), udp(40000), udp(2049)];
        let ports = applicable_ports(&config, &custom, VpnType::WireGuard, false);
        // 40000 is outside every range, 2049 duplicates the base entry
        assert_eq!(ports, vec![udp(2049), udp(6000)]);
    }

    #[test]
    fn wireguard_never_accepts_tcp_custom_ports() {
        let config = vec![
            udp(2049),
            PortSpec::Range {
                transport: Transport::Tcp,
                min: 1,
                max: 65535,
            },
        ];
        let ports = applicable_ports(&config, &[tcp(9999)], VpnType::WireGuard, false);
        assert_eq!(ports, vec![udp(2049)]);
    }

    #[test]
    fn obfsproxy_keeps_only_tcp_on_openvpn() {
        let config = vec![udp(2049), tcp(443), tcp(80)];
        let ports = applicable_ports(&config, &[], VpnType::OpenVpn, true);
        assert_eq!(ports, vec![tcp(443), tcp(80)]);

        // the restriction is an OpenVPN concern
        let wg = applicable_ports(&config, &[], VpnType::WireGuard, true);
        assert_eq!(wg, vec![udp(2049), tcp(443), tcp(80)]);
    }
}
