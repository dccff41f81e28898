//! SkyHop client core — server directory cache and connection
//! reconciliation.
//!
//! The embedding client feeds this crate three external inputs: periodic
//! server-directory snapshots, asynchronous latency probe batches, and
//! connection reports from the backend daemon. The core keeps a consistent,
//! queryable view of the server directory and reconciles connection reports
//! into derived client configuration, pushed out through the injected
//! settings boundary. It performs no I/O of its own.
//!
//! ## Architecture
//!
//! - `ports`: port descriptor normalization and the applicable-port policy
//! - `directory`: snapshot model, merge, and lookup indexes
//! - `ping`: latency batch application and quality tiers
//! - `selector`: fastest-server choice with proximity fallback
//! - `session`: connection/pause state and event types
//! - `settings`: the `SettingsPort` collaborator boundary
//! - `reconcile`: the connection reconciliation state machine
//! - `store`: immutable directory versions behind a single writer

pub mod directory;
pub mod error;
pub mod ping;
pub mod ports;
pub mod reconcile;
pub mod selector;
pub mod session;
pub mod settings;
pub mod store;

pub use directory::{Directory, DirectoryConfig, Host, RawSnapshot, ServerLocation, VpnType};
pub use error::CoreError;
pub use ping::{quality_of, PingMeasurement, PingQuality};
pub use ports::{PortSpec, Transport};
pub use reconcile::ConnectionReconciler;
pub use selector::{fastest_server, pick_fastest, Coordinates};
pub use session::{ConnectionEvent, ConnectionState, DnsConfig, DnsEncryption, PauseState};
pub use settings::{RecordingSettings, SettingsPort};
pub use store::DirectoryStore;
