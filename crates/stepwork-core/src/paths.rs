use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const STEPWORK_DIR: &str = ".stepwork";
pub const SESSIONS_DIR: &str = ".stepwork/sessions";

pub const CONFIG_FILE: &str = ".stepwork/config.yaml";
pub const SCRIPT_FILE: &str = ".stepwork/script.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn sessions_dir(root: &Path) -> PathBuf {
    root.join(SESSIONS_DIR)
}

pub fn session_path(root: &Path, id: &str) -> PathBuf {
    sessions_dir(root).join(format!("{id}.yaml"))
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn script_path(root: &Path) -> PathBuf {
    root.join(SCRIPT_FILE)
}

/// Session ids are uuids; anything else could escape the sessions directory.
pub fn is_valid_session_id(id: &str) -> bool {
    uuid::Uuid::parse_str(id).is_ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
