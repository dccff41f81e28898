//! End-to-end flow: snapshot merge, latency batch, selection, and
//! reconciliation of an externally initiated connection.

use skyhop_core::{
    fastest_server, ConnectionEvent, ConnectionReconciler, DirectoryStore, DnsConfig,
    DnsEncryption, PauseState, PingMeasurement, PortSpec, RawSnapshot, RecordingSettings,
    Transport, VpnType,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn snapshot_json() -> &'static str {
    r#"{
        "wireguard": [
            {
                "gateway": "us-ny.wg.skyhop.net",
                "country_code": "US",
                "country": "United States",
                "city": "New York",
                "latitude": 40.7,
                "longitude": -74.0,
                "hosts": [
                    {"hostname": "us-ny1.wg.skyhop.net", "host": "198.51.100.10", "public_key": "k1", "load": 12.5}
                ]
            },
            {
                "gateway": "de.wg.skyhop.net",
                "country_code": "DE",
                "country": "Germany",
                "city": "Frankfurt",
                "latitude": 50.1,
                "longitude": 8.7,
                "hosts": [
                    {"hostname": "de1.wg.skyhop.net", "host": "198.51.100.20", "public_key": "k2", "load": 3.0},
                    {"hostname": "de2.wg.skyhop.net", "host": "198.51.100.21", "public_key": "k3", "load": 7.0}
                ]
            },
            {
                "gateway": "broken.wg.skyhop.net",
                "country_code": "XX",
                "city": "Nowhere",
                "hosts": []
            }
        ],
        "openvpn": [],
        "config": {
            "antitracker": {
                "default": {"ip": "10.0.254.2"},
                "hardcore": {"ip": "10.0.254.3"}
            },
            "api": {"ips": ["203.0.113.1"], "ipv6s": []},
            "ports": {
                "wireguard": [
                    {"type": "UDP", "port": 2049},
                    {"type": "UDP", "port": 53},
                    {"type": "UDP", "range": {"min": 5500, "max": 19999}}
                ],
                "openvpn": [
                    {"type": "UDP", "port": 2049},
                    {"type": "TCP", "port": 443}
                ]
            }
        }
    }"#
}

fn connection_event(server_ip: &str, port: u16) -> ConnectionEvent {
    serde_json::from_value(serde_json::json!({
        "VpnType": "wireguard",
        "ConnectedSince": 1_700_000_000u64,
        "ClientIP": "10.8.0.5",
        "ServerIP": server_ip,
        "ServerPort": port,
        "IsTCP": false,
        "ManualDNS": {"DnsHost": "10.0.254.2", "Encryption": "none"},
        "Mtu": 1380
    }))
    .expect("valid event")
}

#[test]
fn merge_ping_select_reconcile_flow() {
    init_logging();

    let store = DirectoryStore::new();
    let snapshot = RawSnapshot::from_json(snapshot_json()).expect("valid snapshot");
    let directory = store.merge_snapshot(snapshot);

    // hostless location dropped, remaining list ordered by country/city
    let gateways: Vec<&str> = directory
        .wireguard
        .iter()
        .map(|s| s.gateway.as_str())
        .collect();
    assert_eq!(gateways, vec!["de.wg.skyhop.net", "us-ny.wg.skyhop.net"]);

    let directory = store.apply_pings(&[
        PingMeasurement {
            address: "198.51.100.10".to_string(),
            ms: 95,
        },
        PingMeasurement {
            address: "198.51.100.20".to_string(),
            ms: 18,
        },
    ]);

    // measured latency survives a re-merge of the same snapshot
    let directory_after_refresh =
        store.merge_snapshot(RawSnapshot::from_json(snapshot_json()).expect("valid snapshot"));
    assert_eq!(
        directory_after_refresh
            .server_by_gateway("de.wg.skyhop.net")
            .unwrap()
            .ping,
        directory.server_by_gateway("de.wg.skyhop.net").unwrap().ping,
    );

    let mut settings = RecordingSettings::default();

    let fastest = fastest_server(&directory_after_refresh, &settings).expect("servers available");
    assert_eq!(fastest.gateway, "de.wg.skyhop.net");

    // the daemon reports a connection made from the CLI on an unlisted port
    let mut reconciler = ConnectionReconciler::new();
    reconciler.connected(
        &directory_after_refresh,
        connection_event("198.51.100.20", 7777),
        &mut settings,
    );

    assert!(reconciler.state().is_connected());
    assert_eq!(settings.vpn_type, VpnType::WireGuard);
    assert_eq!(settings.entry_gateway.as_deref(), Some("de.wg.skyhop.net"));
    assert_eq!(
        settings.selected_port,
        Some(PortSpec::Single {
            transport: Transport::Udp,
            port: 7777
        })
    );
    assert_eq!(settings.custom_port_registrations, 1);
    assert!(settings.antitracker);
    assert!(!settings.antitracker_hardcore);
    assert_eq!(settings.mtu, Some(1380));

    // same report again: identical outcome, no duplicate registration
    reconciler.connected(
        &directory_after_refresh,
        connection_event("198.51.100.20", 7777),
        &mut settings,
    );
    assert_eq!(settings.custom_port_registrations, 1);

    // pause and resume round-trip
    reconciler.pause_state_changed(PauseState::Paused, &mut settings);
    assert_eq!(reconciler.pause_state(), PauseState::Paused);
    reconciler.pause_state_changed(PauseState::Resumed, &mut settings);
    assert_eq!(settings.pause_timer_clears, 1);

    // a DNS change away from antitracker becomes a user custom DNS
    reconciler.dns_changed(
        DnsConfig {
            host: "9.9.9.9".to_string(),
            encryption: DnsEncryption::None,
            doh_template: String::new(),
        },
        &directory_after_refresh,
        &mut settings,
    );
    assert!(!settings.antitracker);
    assert!(settings.dns_is_custom);

    reconciler.disconnected("daemon stopped");
    assert!(reconciler.state().is_disconnected());
    assert_eq!(reconciler.pause_state(), PauseState::Resumed);
    assert!(reconciler.connection_info().is_none());
}
