use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Durable tool-name → PID map, rewritten on every lifecycle transition.
///
/// Invariant: the file is a best-effort cache of the supervisor's in-memory
/// table. It may be stale, so every consumer revalidates liveness before
/// trusting a record.
pub struct PidFile {
    path: PathBuf,
    entries: Mutex<HashMap<String, u32>>,
}

impl PidFile {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_entries(&path);
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, tool: &str, pid: u32) {
        let mut entries = self.entries.lock().expect("pid table lock");
        entries.insert(tool.to_string(), pid);
        self.persist(&entries);
    }

    pub fn remove(&self, tool: &str) {
        let mut entries = self.entries.lock().expect("pid table lock");
        if entries.remove(tool).is_some() {
            self.persist(&entries);
        }
    }

    pub fn get(&self, tool: &str) -> Option<u32> {
        self.entries.lock().expect("pid table lock").get(tool).copied()
    }

    pub fn snapshot(&self) -> HashMap<String, u32> {
        self.entries.lock().expect("pid table lock").clone()
    }

    fn persist(&self, entries: &HashMap<String, u32>) {
        let payload = match serde_json::to_string_pretty(entries) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%error, "failed to serialize PID records");
                return;
            }
        };
        if let Err(error) = fs::write(&self.path, payload) {
            warn!(path = %self.path.display(), %error, "failed to persist PID records");
        }
    }
}

fn read_entries(path: &Path) -> HashMap<String, u32> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(error) => {
            warn!(path = %path.display(), %error, "failed to read PID file; starting empty");
            return HashMap::new();
        }
    };
    match serde_json::from_str(&content) {
        Ok(entries) => {
            debug!(path = %path.display(), "loaded PID records");
            entries
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "PID file is corrupt; starting empty");
            HashMap::new()
        }
    }
}
