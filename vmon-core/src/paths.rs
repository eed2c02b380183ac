//! Filesystem locations used by vmon.

use std::path::PathBuf;

/// Get the vmon configuration directory.
///
/// Resolution order:
/// 1. `VMON_CONFIG_DIR` environment variable
/// 2. The platform configuration directory, e.g. `~/.config/vmon`
/// 3. `/etc/vmon` when no home directory can be determined
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("VMON_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    dirs::config_dir().map(|d| d.join("vmon")).unwrap_or_else(|| PathBuf::from("/etc/vmon"))
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}
