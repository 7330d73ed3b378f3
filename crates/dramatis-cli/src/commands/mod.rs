pub mod bootstrap;
pub mod classify;
pub mod inspect;
pub mod normalize;
pub mod play;

use std::path::Path;
use std::sync::Arc;

use dramatis_core::{MemoryRosterStore, Roster, RosterManager, SceneSnapshot};
use serde::de::DeserializeOwned;

/// Read a file, naming it in the error.
fn read_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))
}

/// Read and deserialize a JSON file.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let content = read_file(path)?;
    serde_json::from_str(&content).map_err(|e| format!("invalid JSON in {}: {e}", path.display()))
}

/// Bootstrap a snapshot into a throwaway in-memory roster manager.
fn bootstrap_snapshot(snapshot: &SceneSnapshot) -> Result<Roster, String> {
    let mut manager = RosterManager::new(Arc::new(MemoryRosterStore::new()));
    manager
        .bootstrap(snapshot, None)
        .map_err(|e| format!("cannot bootstrap scene {}: {e}", snapshot.scene_id))
}

fn join_or_dash(names: &[String]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}
