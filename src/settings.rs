//! The settings collaborator boundary.
//!
//! The core never stores user settings. Everything it reads from them and
//! every derived value it pushes back goes through [`SettingsPort`], so all
//! external effects of a reconciliation are visible in one place.

use crate::directory::{ServerLocation, VpnType};
use crate::ports::PortSpec;
use crate::selector::Coordinates;
use crate::session::DnsConfig;

/// Injected settings boundary: reads, writes, and dispatch signals.
pub trait SettingsPort {
    // ── reads ───────────────────────────────────────────────────────────
    fn vpn_type(&self) -> VpnType;
    fn enable_ipv6_in_tunnel(&self) -> bool;
    fn show_gateways_without_ipv6(&self) -> bool;
    fn use_obfsproxy(&self) -> bool;
    fn custom_ports(&self) -> Vec<PortSpec>;
    fn fastest_excluded_gateways(&self) -> Vec<String>;
    fn last_known_location(&self) -> Option<Coordinates>;
    /// Address of the currently selected entry host, if one is pinned.
    fn selected_entry_host_address(&self) -> Option<String>;
    /// Hostname of the currently selected exit host, if one is pinned.
    fn selected_exit_hostname(&self) -> Option<String>;

    // ── writes ──────────────────────────────────────────────────────────
    fn set_vpn_type(&mut self, vpn_type: VpnType);
    fn set_multihop(&mut self, enabled: bool);
    fn set_use_obfsproxy(&mut self, enabled: bool);
    /// `None` records an unresolved selection.
    fn set_entry_server(&mut self, server: Option<&ServerLocation>);
    fn set_exit_server(&mut self, server: Option<&ServerLocation>);
    fn set_port(&mut self, port: Option<PortSpec>);
    /// Register a port learned from an externally initiated connection.
    fn add_custom_port(&mut self, port: PortSpec);
    fn set_dns_custom_config(&mut self, dns: &DnsConfig);
    fn set_dns_is_custom(&mut self, is_custom: bool);
    fn set_antitracker(&mut self, active: bool);
    fn set_antitracker_hardcore(&mut self, active: bool);
    fn set_mtu(&mut self, mtu: Option<u32>);

    // ── dispatch ────────────────────────────────────────────────────────
    fn erase_entry_host(&mut self);
    fn erase_exit_host(&mut self);
    fn clear_pause_timer(&mut self);
}

/// In-memory [`SettingsPort`] implementation.
///
/// Holds every value in plain fields and records the order of pushes in
/// `pushes`. Useful as a starting point for embedders and as the recording
/// double in this crate's own tests.
#[derive(Debug, Default)]
pub struct RecordingSettings {
    pub vpn_type: VpnType,
    pub enable_ipv6_in_tunnel: bool,
    pub show_gateways_without_ipv6: bool,
    pub use_obfsproxy: bool,
    pub is_multihop: bool,
    pub custom_ports: Vec<PortSpec>,
    pub fastest_excluded_gateways: Vec<String>,
    pub last_known_location: Option<Coordinates>,
    pub entry_gateway: Option<String>,
    pub exit_gateway: Option<String>,
    pub selected_entry_host_address: Option<String>,
    pub selected_exit_hostname: Option<String>,
    pub selected_port: Option<PortSpec>,
    pub custom_port_registrations: usize,
    pub dns_custom: Option<DnsConfig>,
    pub dns_is_custom: bool,
    pub antitracker: bool,
    pub antitracker_hardcore: bool,
    pub mtu: Option<u32>,
    pub pause_timer_clears: usize,
    /// Method names of every push, in call order.
    pub pushes: Vec<&'static str>,
}

impl RecordingSettings {
    fn record(&mut self, push: &'static str) {
        self.pushes.push(push);
    }
}

impl SettingsPort for RecordingSettings {
    fn vpn_type(&self) -> VpnType {
        self.vpn_type
    }

    fn enable_ipv6_in_tunnel(&self) -> bool {
        self.enable_ipv6_in_tunnel
    }

    fn show_gateways_without_ipv6(&self) -> bool {
        self.show_gateways_without_ipv6
    }

    fn use_obfsproxy(&self) -> bool {
        self.use_obfsproxy
    }

    fn custom_ports(&self) -> Vec<PortSpec> {
        self.custom_ports.clone()
    }

    fn fastest_excluded_gateways(&self) -> Vec<String> {
        self.fastest_excluded_gateways.clone()
    }

    fn last_known_location(&self) -> Option<Coordinates> {
        self.last_known_location
    }

    fn selected_entry_host_address(&self) -> Option<String> {
        self.selected_entry_host_address.clone()
    }

    fn selected_exit_hostname(&self) -> Option<String> {
        self.selected_exit_hostname.clone()
    }

    fn set_vpn_type(&mut self, vpn_type: VpnType) {
        self.record("set_vpn_type");
        self.vpn_type = vpn_type;
    }

    fn set_multihop(&mut self, enabled: bool) {
        self.record("set_multihop");
        self.is_multihop = enabled;
    }

    fn set_use_obfsproxy(&mut self, enabled: bool) {
        self.record("set_use_obfsproxy");
        self.use_obfsproxy = enabled;
    }

    fn set_entry_server(&mut self, server: Option<&ServerLocation>) {
        self.record("set_entry_server");
        self.entry_gateway = server.map(|s| s.gateway.clone());
    }

    fn set_exit_server(&mut self, server: Option<&ServerLocation>) {
        self.record("set_exit_server");
        self.exit_gateway = server.map(|s| s.gateway.clone());
    }

    fn set_port(&mut self, port: Option<PortSpec>) {
        self.record("set_port");
        self.selected_port = port;
    }

    fn add_custom_port(&mut self, port: PortSpec) {
        self.record("add_custom_port");
        self.custom_port_registrations += 1;
        if !self.custom_ports.contains(&port) {
            self.custom_ports.push(port);
        }
    }

    fn set_dns_custom_config(&mut self, dns: &DnsConfig) {
        self.record("set_dns_custom_config");
        self.dns_custom = Some(dns.clone());
    }

    fn set_dns_is_custom(&mut self, is_custom: bool) {
        self.record("set_dns_is_custom");
        self.dns_is_custom = is_custom;
    }

    fn set_antitracker(&mut self, active: bool) {
        self.record("set_antitracker");
        self.antitracker = active;
    }

    fn set_antitracker_hardcore(&mut self, active: bool) {
        self.record("set_antitracker_hardcore");
        self.antitracker_hardcore = active;
    }

    fn set_mtu(&mut self, mtu: Option<u32>) {
        self.record("set_mtu");
        self.mtu = mtu;
    }

    fn erase_entry_host(&mut self) {
        self.record("erase_entry_host");
        self.selected_entry_host_address = None;
    }

    fn erase_exit_host(&mut self) {
        self.record("erase_exit_host");
        self.selected_exit_hostname = None;
    }

    fn clear_pause_timer(&mut self) {
        self.record("clear_pause_timer");
        self.pause_timer_clears += 1;
    }
}
