//! Session value types: connection state, pause state, DNS configuration,
//! and the connection event reported by the backend daemon.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::VpnType;

/// VPN connection state as reported by the daemon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Wait,
    Auth,
    GetConfig,
    AssignIp,
    AddRoutes,
    Reconnecting,
    TcpConnect,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    pub fn is_disconnected(&self) -> bool {
        *self == ConnectionState::Disconnected
    }

    pub fn is_connected(&self) -> bool {
        *self == ConnectionState::Connected
    }

    pub fn is_disconnecting(&self) -> bool {
        *self == ConnectionState::Disconnecting
    }

    /// True for the whole connecting chain.
    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::Wait
                | ConnectionState::Auth
                | ConnectionState::GetConfig
                | ConnectionState::AssignIp
                | ConnectionState::AddRoutes
                | ConnectionState::Reconnecting
                | ConnectionState::TcpConnect
        )
    }

    pub fn status_text(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Wait => "Waiting for server...",
            ConnectionState::Auth => "Authenticating...",
            ConnectionState::GetConfig => "Fetching configuration...",
            ConnectionState::AssignIp => "Assigning address...",
            ConnectionState::AddRoutes => "Adding routes...",
            ConnectionState::Reconnecting => "Reconnecting...",
            ConnectionState::TcpConnect => "Connecting over TCP...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnecting => "Disconnecting...",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.status_text())
    }
}

/// Pause state of an established connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PauseState {
    #[default]
    Resumed,
    Pausing,
    Paused,
    Resuming,
}

/// DNS resolver encryption mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DnsEncryption {
    #[default]
    None,
    DnsOverTls,
    DnsOverHttps,
}

/// Manual DNS configuration carried by connection events and DNS updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(rename = "DnsHost", default)]
    pub host: String,
    #[serde(rename = "Encryption", default)]
    pub encryption: DnsEncryption,
    #[serde(rename = "DohTemplate", default)]
    pub doh_template: String,
}

impl DnsConfig {
    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }
}

/// A connection report from the backend daemon.
///
/// Emitted on every state change, including connections this client did not
/// initiate (e.g. started from the command line), so every field is treated
/// as the source of truth and reconciled into settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    #[serde(rename = "VpnType")]
    pub vpn_type: VpnType,
    #[serde(rename = "ConnectedSince", with = "chrono::serde::ts_seconds")]
    pub connected_since: DateTime<Utc>,
    #[serde(rename = "ClientIP", default)]
    pub client_ip: String,
    #[serde(rename = "ClientIPv6", default)]
    pub client_ipv6: String,
    #[serde(rename = "ServerIP", default)]
    pub server_ip: String,
    /// 0 when the daemon did not report a port.
    #[serde(rename = "ServerPort", default)]
    pub server_port: u16,
    /// Empty for single-hop connections.
    #[serde(rename = "ExitHostname", default)]
    pub exit_hostname: String,
    #[serde(rename = "ManualDNS", default)]
    pub manual_dns: Option<DnsConfig>,
    /// WireGuard only; 0 means "unset".
    #[serde(rename = "Mtu", default)]
    pub mtu: Option<u32>,
    /// Absent when the daemon gave no transport indicator.
    #[serde(rename = "IsTCP", default)]
    pub is_tcp: Option<bool>,
    #[serde(rename = "IsObfsproxy", default)]
    pub is_obfsproxy: bool,
    #[serde(rename = "IsCanPause", default)]
    pub is_can_pause: bool,
}

impl ConnectionEvent {
    /// Multihop is signalled by a non-empty exit hostname.
    pub fn is_multihop(&self) -> bool {
        !self.exit_hostname.is_empty()
    }
}
