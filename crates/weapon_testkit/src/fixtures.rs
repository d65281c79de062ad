//! Test fixtures: replicas and an in-process remote.

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use weapon::{DeviceId, ManualClock, Weapon, WeaponConfig};
use weapon_core::{EventPayload, ItemKey, Rating};
use weapon_sync_engine::{FaultyTransport, HttpTransport, LoopbackClient, LoopbackServer};
use weapon_sync_server::{ServerConfig, SyncServer};

/// Backend name used by the fixtures.
pub const BACKEND: &str = "backend1";

/// User id used by the fixtures.
pub const USER: &str = "user-1";

/// Routes loopback requests to a [`SyncServer`] in the same process.
#[derive(Debug, Clone)]
pub struct InProcessRemote(pub Arc<SyncServer>);

impl LoopbackServer for InProcessRemote {
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String> {
        self.0.route(path, body).map_err(|e| e.to_string())
    }
}

/// Transport to an in-process remote, with fault injection.
pub type RemoteTransport = FaultyTransport<HttpTransport<LoopbackClient<InProcessRemote>>>;

/// Builds a transport to `server`.
pub fn remote_transport(server: &Arc<SyncServer>) -> Arc<RemoteTransport> {
    Arc::new(FaultyTransport::new(HttpTransport::new(
        "loopback://sync",
        LoopbackClient::new(InProcessRemote(Arc::clone(server))),
    )))
}

/// A review payload for a lexeme card.
pub fn review_payload(word: &str, rating: Rating) -> EventPayload {
    EventPayload::Review {
        key: ItemKey::lexeme(word),
        rating,
    }
}

/// In-memory replica with a fixed device id and a manual clock.
pub fn memory_weapon(device_byte: u8, start_ms: u64) -> Weapon {
    Weapon::open_with_clock(
        WeaponConfig::new(USER).with_device_id(DeviceId::from_bytes([device_byte; 16])),
        Arc::new(ManualClock::new(start_ms)),
    )
    .expect("Failed to open in-memory weapon")
}

/// A replica in a temporary directory, removed on drop.
pub struct TestWeapon {
    /// The replica.
    pub weapon: Weapon,
    temp_dir: TempDir,
}

impl TestWeapon {
    /// Opens a fresh persistent replica.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let weapon = Weapon::open(Self::config_for(&temp_dir)).expect("Failed to open weapon");
        Self { weapon, temp_dir }
    }

    /// Data directory of the replica.
    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().join("data")
    }

    /// Closes and reopens the replica from disk.
    pub fn reopen(self) -> Self {
        let Self { weapon, temp_dir } = self;
        drop(weapon);
        let weapon = Weapon::open(Self::config_for(&temp_dir)).expect("Failed to reopen weapon");
        Self { weapon, temp_dir }
    }

    fn config_for(temp_dir: &TempDir) -> WeaponConfig {
        WeaponConfig::new(USER).with_data_dir(temp_dir.path().join("data"))
    }
}

impl Default for TestWeapon {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestWeapon {
    type Target = Weapon;

    fn deref(&self) -> &Self::Target {
        &self.weapon
    }
}

/// Two replicas of one user syncing through one in-process remote.
pub struct TwoDeviceHarness {
    /// The remote.
    pub server: Arc<SyncServer>,
    /// Device `[1; 16]`.
    pub a: Weapon,
    /// Device `[2; 16]`.
    pub b: Weapon,
    /// Transport of `a`, for fault injection.
    pub a_transport: Arc<RemoteTransport>,
    /// Transport of `b`, for fault injection.
    pub b_transport: Arc<RemoteTransport>,
}

impl TwoDeviceHarness {
    /// Creates both replicas with backend [`BACKEND`] registered.
    pub fn new() -> Self {
        let server = Arc::new(SyncServer::new(ServerConfig::default()));
        let a = memory_weapon(1, 1_000);
        let b = memory_weapon(2, 1_500);
        let a_transport = remote_transport(&server);
        let b_transport = remote_transport(&server);
        a.register_backend(BACKEND, a_transport.clone())
            .expect("Failed to register backend");
        b.register_backend(BACKEND, b_transport.clone())
            .expect("Failed to register backend");
        Self {
            server,
            a,
            b,
            a_transport,
            b_transport,
        }
    }

    /// Syncs a, then b, then a again, panicking on any failed cycle.
    pub fn sync_all(&self) {
        for weapon in [&self.a, &self.b, &self.a] {
            let outcome = weapon.sync(BACKEND).expect("Failed to start sync");
            assert!(outcome.is_success(), "sync failed: {:?}", outcome.error());
        }
    }

    /// Returns true if both replicas hold the same events.
    pub fn converged(&self) -> bool {
        self.a.events(None).ok() == self.b.events(None).ok()
    }
}

impl Default for TwoDeviceHarness {
    fn default() -> Self {
        Self::new()
    }
}
