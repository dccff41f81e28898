//! Connection reconciliation.
//!
//! The backend daemon reports connection state changes for every tunnel,
//! including ones this client did not initiate. The reconciler folds those
//! reports into the session state machine and derives the client
//! configuration (protocol, multihop endpoints, ports, DNS, MTU) against the
//! current directory, pushing every derived value through the injected
//! [`SettingsPort`].
//!
//! Ordering inside the Connected transition matters: the protocol must be
//! pushed before any directory lookup that filters by it, and the obfsproxy
//! flag before the applicable port set is computed.

use crate::directory::{AntitrackerConfig, Directory, ServerLocation, VpnType};
use crate::ports::{self, PortSpec, Transport};
use crate::session::{ConnectionEvent, ConnectionState, DnsConfig, DnsEncryption, PauseState};
use crate::settings::SettingsPort;

/// Session state machine over daemon-reported events.
#[derive(Debug, Default)]
pub struct ConnectionReconciler {
    state: ConnectionState,
    pause_state: PauseState,
    connection_info: Option<ConnectionEvent>,
    disconnected_reason: Option<String>,
    dns: DnsConfig,
}

impl ConnectionReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn pause_state(&self) -> PauseState {
        self.pause_state
    }

    pub fn connection_info(&self) -> Option<&ConnectionEvent> {
        self.connection_info.as_ref()
    }

    pub fn disconnected_reason(&self) -> Option<&str> {
        self.disconnected_reason.as_deref()
    }

    pub fn dns(&self) -> &DnsConfig {
        &self.dns
    }

    /// Record a daemon-reported state change.
    ///
    /// Entering `Disconnected` always clears the stored connection info and
    /// resets the pause state.
    pub fn set_state(&mut self, state: ConnectionState) {
        log::info!("connection state: {}", state.status_text());
        self.state = state;
        if state == ConnectionState::Disconnected {
            self.connection_info = None;
            self.pause_state = PauseState::Resumed;
        }
    }

    /// Record a disconnection with its reason.
    pub fn disconnected(&mut self, reason: impl Into<String>) {
        self.disconnected_reason = Some(reason.into());
        self.set_state(ConnectionState::Disconnected);
    }

    /// Record a pause-state change; resuming also clears the pause timer.
    pub fn pause_state_changed(&mut self, state: PauseState, settings: &mut dyn SettingsPort) {
        self.pause_state = state;
        if matches!(state, PauseState::Resumed | PauseState::Resuming) {
            settings.clear_pause_timer();
        }
    }

    /// Record a DNS change reported outside a connection event and re-derive
    /// the antitracker flags.
    pub fn dns_changed(
        &mut self,
        dns: DnsConfig,
        directory: &Directory,
        settings: &mut dyn SettingsPort,
    ) {
        self.dns = dns;
        self.push_dns_settings(directory, settings);
    }

    /// Reconcile a Connected report into derived settings.
    ///
    /// The connection may have been established outside this client, so the
    /// event data is adopted as-is: protocol, multihop, entry/exit servers,
    /// port, DNS and MTU are all derived from it and pushed to settings.
    pub fn connected(
        &mut self,
        directory: &Directory,
        event: ConnectionEvent,
        settings: &mut dyn SettingsPort,
    ) {
        self.state = ConnectionState::Connected;
        self.disconnected_reason = None;

        // protocol and multihop first: the active server list depends on them
        let is_multihop = event.is_multihop();
        settings.set_vpn_type(event.vpn_type);
        settings.set_multihop(is_multihop);

        let require_ipv6 =
            settings.enable_ipv6_in_tunnel() && !settings.show_gateways_without_ipv6();
        let active = directory.active_servers(event.vpn_type, require_ipv6);

        let entry = find_server_by_address(&active, &event.server_ip);
        if entry.is_none() {
            log::warn!(
                "connected server {} not present in the directory",
                event.server_ip
            );
        }
        settings.set_entry_server(entry);

        if is_multihop {
            let exit = find_server_by_hostname(&active, &event.exit_hostname);
            if exit.is_none() {
                log::warn!(
                    "exit host '{}' not present in the directory",
                    event.exit_hostname
                );
            }
            settings.set_exit_server(exit);
        }

        // obfsproxy restricts the applicable port set, push it before ports
        settings.set_use_obfsproxy(event.is_obfsproxy);

        if event.server_port > 0 {
            if let Some(is_tcp) = event.is_tcp {
                self.apply_port_selection(directory, &event, is_tcp, settings);
            }
        }

        // pinned host selections must match the connection we ended up with
        if let Some(address) = settings.selected_entry_host_address() {
            if address != event.server_ip {
                settings.erase_entry_host();
            }
        }
        if let Some(hostname) = settings.selected_exit_hostname() {
            if hostname != event.exit_hostname {
                settings.erase_exit_host();
            }
        }

        self.dns = event.manual_dns.clone().unwrap_or_default();
        self.push_dns_settings(directory, settings);

        if event.vpn_type == VpnType::WireGuard {
            if let Some(mtu) = event.mtu {
                settings.set_mtu(if mtu == 0 { None } else { Some(mtu) });
            }
        }

        self.connection_info = Some(event);
    }

    fn apply_port_selection(
        &self,
        directory: &Directory,
        event: &ConnectionEvent,
        is_tcp: bool,
        settings: &mut dyn SettingsPort,
    ) {
        let transport = if is_tcp { Transport::Tcp } else { Transport::Udp };
        let connected_port = PortSpec::Single {
            transport,
            port: event.server_port,
        };

        let config_ports = directory.config.ports_for(event.vpn_type);
        let applicable = ports::applicable_ports(
            config_ports,
            &settings.custom_ports(),
            event.vpn_type,
            event.is_obfsproxy,
        );

        let selected = if ports::exists(&applicable, connected_port) {
            Some(connected_port)
        } else if ports::contains(&ports::allowed_port_ranges(config_ports), connected_port) {
            // an outside connection (e.g. CLI) on a port we did not know yet
            settings.add_custom_port(connected_port);
            Some(connected_port)
        } else if !applicable.is_empty() {
            // port-based multihop/obfsproxy connections use ports outside
            // the list; fall back to the same number, then the same transport
            applicable
                .iter()
                .copied()
                .find(|p| p.single_port() == Some(event.server_port) && p.transport() == transport)
                .or_else(|| {
                    applicable
                        .iter()
                        .copied()
                        .find(|p| p.transport() == transport)
                })
        } else {
            Some(connected_port)
        };

        settings.set_port(selected);
    }

    fn push_dns_settings(&self, directory: &Directory, settings: &mut dyn SettingsPort) {
        let antitracker = &directory.config.antitracker;
        let active = is_antitracker_active(&self.dns, antitracker);
        settings.set_antitracker(active);

        if active {
            settings
                .set_antitracker_hardcore(is_antitracker_hardcore_active(&self.dns, antitracker));
        } else if self.dns.is_empty() {
            settings.set_dns_is_custom(false);
        } else {
            settings.set_dns_custom_config(&self.dns);
            settings.set_dns_is_custom(true);
        }
    }
}

/// Antitracker is active when DNS points, unencrypted, at one of the
/// configured antitracker addresses.
pub fn is_antitracker_active(dns: &DnsConfig, config: &AntitrackerConfig) -> bool {
    if dns.is_empty() || dns.encryption != DnsEncryption::None {
        return false;
    }
    dns.host == config.default_ip || dns.host == config.hardcore_ip
}

/// Hardcore mode additionally requires the hardcore address specifically.
pub fn is_antitracker_hardcore_active(dns: &DnsConfig, config: &AntitrackerConfig) -> bool {
    if dns.is_empty() || dns.encryption != DnsEncryption::None {
        return false;
    }
    dns.host == config.hardcore_ip
}

fn find_server_by_address<'a>(
    servers: &[&'a ServerLocation],
    address: &str,
) -> Option<&'a ServerLocation> {
    if address.is_empty() {
        return None;
    }
    servers
        .iter()
        .copied()
        .find(|s| s.hosts.iter().any(|h| h.address == address))
}

fn find_server_by_hostname<'a>(
    servers: &[&'a ServerLocation],
    hostname: &str,
) -> Option<&'a ServerLocation> {
    servers
        .iter()
        .copied()
        .find(|s| s.hosts.iter().any(|h| h.hostname == hostname))
}
