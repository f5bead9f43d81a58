//! The single-writer service loop that owns the config state.
//!
//! All store and sync mutation happens on this task — watcher callbacks
//! and host transport deliveries only enqueue work here. The banner hook
//! reads concurrently through the shared `RwLock`.

use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

use waymark_types::Biome;

use crate::config::{ConfigStore, ConfigValue, EntryKey, biome_entry_key};
use crate::hook;
use crate::sync::{ConfigSync, Handshake, SyncPayload, SyncRole};
use crate::watcher::{ConfigWatcher, WatchEvent};

/// Commands accepted by the service loop.
#[derive(Debug)]
pub enum ServiceCommand {
    /// Re-read the backing file.
    Reload,
    /// Persist current values.
    Save,
    /// Set one entry's value locally.
    Set { key: EntryKey, value: ConfigValue },
    /// Merge a payload received from the authority.
    ApplySync(SyncPayload),
    /// A subordinate joined; gate it and push the current value set.
    PeerJoined(Handshake),
    /// The authority refused us; retain the message for display.
    ConnectionRefused(String),
    /// Save and stop.
    Shutdown,
}

/// State shared between the service loop and embedder handles.
pub struct SharedState {
    pub store: RwLock<ConfigStore>,
    pub sync: RwLock<ConfigSync>,
}

impl SharedState {
    pub fn new(store: ConfigStore, sync: ConfigSync) -> Self {
        Self {
            store: RwLock::new(store),
            sync: RwLock::new(sync),
        }
    }
}

/// Handle the host embeds to talk to the service.
#[derive(Clone)]
pub struct ServiceHandle {
    cmd_tx: mpsc::Sender<ServiceCommand>,
    shared: Arc<SharedState>,
}

impl ServiceHandle {
    // --- Notification pipeline observer ---

    /// Pre-display observer for the biome arrival banner; the host calls
    /// this with the outgoing text just before showing it. Returns whether
    /// the text was substituted.
    pub async fn rewrite_banner(&self, text: &mut String, genuine_arrival: bool) -> bool {
        let store = self.shared.store.read().await;
        hook::rewrite_banner(&store, text, genuine_arrival)
    }

    /// Current banner message for a biome.
    pub async fn biome_message(&self, biome: Biome) -> Option<String> {
        let store = self.shared.store.read().await;
        store.text(&biome_entry_key(biome)).map(str::to_string)
    }

    /// This participant's join announcement.
    pub async fn handshake(&self) -> Handshake {
        self.shared.sync.read().await.handshake()
    }

    /// Retained connection error, for the host's connect screen.
    pub async fn connection_error(&self) -> Option<String> {
        let sync = self.shared.sync.read().await;
        sync.connection_error().map(str::to_string)
    }

    // --- Command senders ---

    pub async fn reload(&self) -> Result<(), String> {
        self.send(ServiceCommand::Reload).await
    }

    pub async fn save(&self) -> Result<(), String> {
        self.send(ServiceCommand::Save).await
    }

    pub async fn set(&self, key: EntryKey, value: ConfigValue) -> Result<(), String> {
        self.send(ServiceCommand::Set { key, value }).await
    }

    pub async fn apply_sync(&self, payload: SyncPayload) -> Result<(), String> {
        self.send(ServiceCommand::ApplySync(payload)).await
    }

    pub async fn peer_joined(&self, handshake: Handshake) -> Result<(), String> {
        self.send(ServiceCommand::PeerJoined(handshake)).await
    }

    pub async fn connection_refused(&self, message: String) -> Result<(), String> {
        self.send(ServiceCommand::ConnectionRefused(message)).await
    }

    pub async fn shutdown(&self) -> Result<(), String> {
        self.send(ServiceCommand::Shutdown).await
    }

    async fn send(&self, cmd: ServiceCommand) -> Result<(), String> {
        self.cmd_tx.send(cmd).await.map_err(|e| e.to_string())
    }
}

/// Spawn the service loop.
///
/// `watcher` is optional so hosts without a writable config directory can
/// still run; `push_tx` carries authority snapshots out to the host for
/// broadcast and is unused on subordinates.
pub fn spawn(
    store: ConfigStore,
    sync: ConfigSync,
    watcher: Option<ConfigWatcher>,
    push_tx: Option<mpsc::Sender<SyncPayload>>,
) -> (ServiceHandle, JoinHandle<()>) {
    let shared = Arc::new(SharedState::new(store, sync));
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let handle = ServiceHandle {
        cmd_tx,
        shared: Arc::clone(&shared),
    };
    let task = tokio::spawn(run(shared, cmd_rx, watcher, push_tx));
    (handle, task)
}

async fn run(
    shared: Arc<SharedState>,
    mut cmd_rx: mpsc::Receiver<ServiceCommand>,
    mut watcher: Option<ConfigWatcher>,
    push_tx: Option<mpsc::Sender<SyncPayload>>,
) {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None | Some(ServiceCommand::Shutdown) => break,
                    Some(cmd) => handle_command(&shared, cmd, &push_tx).await,
                }
            }
            event = next_watch_event(&mut watcher) => {
                match event {
                    Some(WatchEvent::Changed) => reload_config(&shared, &push_tx).await,
                    Some(WatchEvent::Error(msg)) => {
                        tracing::warn!(error = %msg, "config watcher error");
                    }
                    None => {
                        // Backend gone; stop polling this arm.
                        watcher = None;
                    }
                }
            }
        }
    }

    // Orderly shutdown persists current values.
    if let Err(e) = shared.store.read().await.save() {
        tracing::error!(error = %e, "failed to save config on shutdown");
    }
}

async fn next_watch_event(watcher: &mut Option<ConfigWatcher>) -> Option<WatchEvent> {
    match watcher {
        Some(w) => w.next_event().await,
        None => std::future::pending().await,
    }
}

async fn handle_command(
    shared: &Arc<SharedState>,
    cmd: ServiceCommand,
    push_tx: &Option<mpsc::Sender<SyncPayload>>,
) {
    match cmd {
        ServiceCommand::Reload => reload_config(shared, push_tx).await,

        ServiceCommand::Save => {
            if let Err(e) = shared.store.read().await.save() {
                tracing::error!(error = %e, "failed to save config");
            }
        }

        ServiceCommand::Set { key, value } => {
            let mut store = shared.store.write().await;
            let sync = shared.sync.read().await;
            if store.set_value(&key, value) {
                // A locked subordinate cannot override authority values.
                let overridden = sync.enforce_lock(&mut store);
                if overridden > 0 {
                    tracing::debug!(%key, "configuration locked, kept authority value");
                }
                if sync.role() == SyncRole::Authority {
                    push_snapshot(&sync, &store, push_tx).await;
                }
            }
        }

        ServiceCommand::ApplySync(payload) => {
            let mut store = shared.store.write().await;
            let mut sync = shared.sync.write().await;
            let changed = sync.apply(&mut store, &payload);
            tracing::debug!(entries = payload.len(), changed, "applied sync payload");
        }

        ServiceCommand::PeerJoined(handshake) => {
            let store = shared.store.read().await;
            let mut sync = shared.sync.write().await;
            match sync.accept_peer(&handshake) {
                Ok(()) => {
                    tracing::info!(
                        peer = %handshake.display_name,
                        version = %handshake.current,
                        "peer joined, pushing current configuration"
                    );
                    push_snapshot(&sync, &store, push_tx).await;
                }
                Err(e) => {
                    tracing::info!(error = %e, "peer refused");
                }
            }
        }

        ServiceCommand::ConnectionRefused(message) => {
            shared.sync.write().await.record_refusal(message);
        }

        // Handled by the loop itself.
        ServiceCommand::Shutdown => {}
    }
}

async fn reload_config(shared: &Arc<SharedState>, push_tx: &Option<mpsc::Sender<SyncPayload>>) {
    tracing::debug!("config file change detected, reloading");

    let mut store = shared.store.write().await;
    let sync = shared.sync.read().await;

    // A change event for a deleted file waits for the recreation event.
    if !store.path().exists() {
        return;
    }

    match store.reload() {
        Ok(()) => {
            let overridden = sync.enforce_lock(&mut store);
            if overridden > 0 {
                tracing::debug!(overridden, "configuration locked, restored synchronized values");
            }
            if sync.role() == SyncRole::Authority {
                push_snapshot(&sync, &store, push_tx).await;
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "there was an issue loading your config file");
            tracing::error!("please check your config entries for spelling and format");
        }
    }
}

async fn push_snapshot(
    sync: &ConfigSync,
    store: &ConfigStore,
    push_tx: &Option<mpsc::Sender<SyncPayload>>,
) {
    if let Some(tx) = push_tx {
        if tx.send(sync.snapshot(store)).await.is_err() {
            tracing::warn!("sync push channel closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::bind_biome_entries;
    use crate::sync::ProtocolVersion;
    use std::path::Path;
    use std::time::Duration;

    const V1: ProtocolVersion = ProtocolVersion::new(1, 0, 0);

    fn build_state(path: &Path, role: SyncRole) -> (ConfigStore, ConfigSync) {
        let mut store = ConfigStore::open(path).unwrap();
        let mut sync = ConfigSync::new("Waymark", role, V1, V1);
        bind_biome_entries(&mut store, &mut sync);
        (store, sync)
    }

    async fn wait_for<F, Fut>(mut probe: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let deadline = Duration::from_secs(10);
        tokio::time::timeout(deadline, async {
            loop {
                if probe().await {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("condition not reached before timeout");
    }

    #[tokio::test]
    async fn authority_pushes_to_subordinate_on_join() {
        let dir = tempfile::tempdir().unwrap();

        let (mut a_store, a_sync) = build_state(&dir.path().join("server.toml"), SyncRole::Authority);
        a_store.set_value(
            &biome_entry_key(Biome::Meadows),
            ConfigValue::text("Welcome home."),
        );
        let (push_tx, mut push_rx) = mpsc::channel(8);
        let (authority, _a_task) = spawn(a_store, a_sync, None, Some(push_tx));

        let (s_store, s_sync) = build_state(&dir.path().join("client.toml"), SyncRole::Subordinate);
        let (subordinate, _s_task) = spawn(s_store, s_sync, None, None);

        // Host transport: deliver the join, then relay the pushed payload.
        let join = subordinate.handshake().await;
        authority.peer_joined(join).await.unwrap();
        let payload = tokio::time::timeout(Duration::from_secs(5), push_rx.recv())
            .await
            .expect("no push before timeout")
            .expect("push channel closed");
        subordinate.apply_sync(payload).await.unwrap();

        wait_for(|| async {
            subordinate.biome_message(Biome::Meadows).await.as_deref() == Some("Welcome home.")
        })
        .await;
    }

    #[tokio::test]
    async fn old_peer_is_refused_with_retained_error() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sync) = build_state(&dir.path().join("server.toml"), SyncRole::Authority);
        let (push_tx, mut push_rx) = mpsc::channel(8);
        let (authority, _task) = spawn(store, sync, None, Some(push_tx));

        authority
            .peer_joined(Handshake {
                display_name: "Waymark".into(),
                current: ProtocolVersion::new(0, 9, 0),
                minimum_required: ProtocolVersion::new(0, 9, 0),
            })
            .await
            .unwrap();

        wait_for(|| async { authority.connection_error().await.is_some() }).await;
        let error = authority.connection_error().await.unwrap();
        assert!(error.contains("0.9.0"));
        assert!(error.contains("1.0.0"));
        assert!(push_rx.try_recv().is_err(), "refused peer must not get a push");
    }

    #[tokio::test]
    async fn subordinate_retains_refusal_message() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sync) = build_state(&dir.path().join("client.toml"), SyncRole::Subordinate);
        let (subordinate, _task) = spawn(store, sync, None, None);

        subordinate
            .connection_refused("Waymark: server requires version 1.0.0".into())
            .await
            .unwrap();

        wait_for(|| async { subordinate.connection_error().await.is_some() }).await;
        assert_eq!(
            subordinate.connection_error().await.as_deref(),
            Some("Waymark: server requires version 1.0.0")
        );
    }

    #[tokio::test]
    async fn banner_flows_through_the_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waymark.toml");
        std::fs::write(
            &path,
            "[Biomes]\n\"Meadows Text\" = \"Welcome home.\"\n",
        )
        .unwrap();

        let (store, sync) = build_state(&path, SyncRole::Authority);
        let (handle, _task) = spawn(store, sync, None, None);

        let mut text = String::from("$biome_meadows");
        assert!(handle.rewrite_banner(&mut text, true).await);
        assert_eq!(text, "Welcome home.");

        let mut teleport = String::from("$biome_meadows");
        assert!(!handle.rewrite_banner(&mut teleport, false).await);
        assert_eq!(teleport, "$biome_meadows");
    }

    #[tokio::test]
    async fn file_edit_is_hot_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waymark.toml");

        let (store, sync) = build_state(&path, SyncRole::Authority);
        store.save().unwrap();
        let watcher = ConfigWatcher::new(&path).unwrap();
        let (handle, _task) = spawn(store, sync, Some(watcher), None);
        tokio::time::sleep(Duration::from_millis(250)).await;

        std::fs::write(
            &path,
            "[Biomes]\n\"Meadows Text\" = \"Welcome home.\"\n",
        )
        .unwrap();

        wait_for(|| async {
            handle.biome_message(Biome::Meadows).await.as_deref() == Some("Welcome home.")
        })
        .await;
    }

    #[tokio::test]
    async fn malformed_edit_keeps_previous_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waymark.toml");
        std::fs::write(
            &path,
            "[Biomes]\n\"Meadows Text\" = \"Welcome home.\"\n",
        )
        .unwrap();

        let (store, sync) = build_state(&path, SyncRole::Authority);
        let (handle, _task) = spawn(store, sync, None, None);

        std::fs::write(&path, "[Biomes\nnot toml").unwrap();
        handle.reload().await.unwrap();

        // Give the command time to process, then confirm nothing changed.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            handle.biome_message(Biome::Meadows).await.as_deref(),
            Some("Welcome home.")
        );
    }

    #[tokio::test]
    async fn shutdown_saves_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waymark.toml");

        let (store, sync) = build_state(&path, SyncRole::Authority);
        let (handle, task) = spawn(store, sync, None, None);

        handle
            .set(
                biome_entry_key(Biome::Plains),
                ConfigValue::text("Watch for deathsquitos."),
            )
            .await
            .unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Watch for deathsquitos."));
        assert!(contents.contains("[Biomes]"));
    }

    #[tokio::test]
    async fn authority_set_pushes_a_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sync) = build_state(&dir.path().join("server.toml"), SyncRole::Authority);
        let (push_tx, mut push_rx) = mpsc::channel(8);
        let (authority, _task) = spawn(store, sync, None, Some(push_tx));

        authority
            .set(
                biome_entry_key(Biome::Ocean),
                ConfigValue::text("Mind the serpents."),
            )
            .await
            .unwrap();

        let payload = tokio::time::timeout(Duration::from_secs(5), push_rx.recv())
            .await
            .expect("no push before timeout")
            .expect("push channel closed");
        assert!(payload.values.iter().any(|v| {
            v.name == "Ocean Text" && v.value == ConfigValue::text("Mind the serpents.")
        }));
    }
}
