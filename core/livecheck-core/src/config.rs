//! Runtime configuration.
//!
//! Every field has a default matching a stock installation, so a missing file
//! is not an error. Example:
//!
//! ```toml
//! [probes]
//! live_mode = "/usr/libexec/helper-scripts/live-mode.sh"
//! writable_fs_lists = "/usr/libexec/helper-scripts/get_writable_fs_lists.sh"
//! writable_source = "script"   # or "mount_table"
//!
//! [install]
//! monitor_dir = "/var/lib/desktop-config-dist/livecheck"
//! marker_file = "install-running"
//!
//! [mounts]
//! table = "/proc/self/mounts"
//! sys_block_root = "/sys/class/block"
//! ```

use fs_err as fs;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{LivecheckError, Result};
use crate::mounts::SysfsBlock;
use crate::probe::{CommandProbeAdapter, WritableSource};

pub const CONFIG_ENV_VAR: &str = "LIVECHECK_CONFIG";
const USER_CONFIG_RELATIVE_PATH: &str = "livecheck/config.toml";
const SYSTEM_CONFIG_PATH: &str = "/etc/livecheck/config.toml";

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WritableSourceKind {
    #[default]
    Script,
    MountTable,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    #[serde(default = "default_live_mode_probe")]
    pub live_mode: PathBuf,
    #[serde(default = "default_writable_fs_lists_probe")]
    pub writable_fs_lists: PathBuf,
    #[serde(default)]
    pub writable_source: WritableSourceKind,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            live_mode: default_live_mode_probe(),
            writable_fs_lists: default_writable_fs_lists_probe(),
            writable_source: WritableSourceKind::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InstallConfig {
    #[serde(default = "default_install_monitor_dir")]
    pub monitor_dir: PathBuf,
    #[serde(default = "default_install_marker_file")]
    pub marker_file: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            monitor_dir: default_install_monitor_dir(),
            marker_file: default_install_marker_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MountConfig {
    #[serde(default = "default_mount_table")]
    pub table: PathBuf,
    #[serde(default = "default_sys_block_root")]
    pub sys_block_root: PathBuf,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            table: default_mount_table(),
            sys_block_root: default_sys_block_root(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct LivecheckConfig {
    #[serde(default)]
    pub probes: ProbeConfig,
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub mounts: MountConfig,
}

impl LivecheckConfig {
    /// Full path of the "installation in progress" marker.
    pub fn install_marker_path(&self) -> PathBuf {
        self.install.monitor_dir.join(&self.install.marker_file)
    }

    pub fn probe_adapter(&self) -> CommandProbeAdapter {
        CommandProbeAdapter::new(&self.probes.live_mode, &self.probes.writable_fs_lists)
    }

    pub fn writable_source(&self) -> WritableSource {
        match self.probes.writable_source {
            WritableSourceKind::Script => WritableSource::Script,
            WritableSourceKind::MountTable => WritableSource::MountTable {
                path: self.mounts.table.clone(),
                sysfs: SysfsBlock::new(&self.mounts.sys_block_root),
            },
        }
    }
}

fn default_live_mode_probe() -> PathBuf {
    PathBuf::from("/usr/libexec/helper-scripts/live-mode.sh")
}

fn default_writable_fs_lists_probe() -> PathBuf {
    PathBuf::from("/usr/libexec/helper-scripts/get_writable_fs_lists.sh")
}

fn default_install_monitor_dir() -> PathBuf {
    PathBuf::from("/var/lib/desktop-config-dist/livecheck")
}

fn default_install_marker_file() -> String {
    "install-running".to_string()
}

fn default_mount_table() -> PathBuf {
    PathBuf::from("/proc/self/mounts")
}

fn default_sys_block_root() -> PathBuf {
    PathBuf::from("/sys/class/block")
}

/// Picks the config file: `$LIVECHECK_CONFIG`, then the user config dir, then
/// `/etc/livecheck/config.toml`.
pub fn default_config_path() -> PathBuf {
    if let Some(path) = env::var_os(CONFIG_ENV_VAR).filter(|value| !value.is_empty()) {
        return PathBuf::from(path);
    }
    if let Some(user_path) = dirs::config_dir().map(|dir| dir.join(USER_CONFIG_RELATIVE_PATH)) {
        if user_path.exists() {
            return user_path;
        }
    }
    PathBuf::from(SYSTEM_CONFIG_PATH)
}

pub fn load_config(path: Option<PathBuf>) -> Result<LivecheckConfig> {
    let config_path = path.unwrap_or_else(default_config_path);
    load_config_from(&config_path)
}

fn load_config_from(config_path: &Path) -> Result<LivecheckConfig> {
    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config file; using defaults");
        return Ok(LivecheckConfig::default());
    }

    let content = fs::read_to_string(config_path).map_err(|source| LivecheckError::Io {
        context: format!("reading config {}", config_path.display()),
        source,
    })?;
    toml::from_str::<LivecheckConfig>(&content).map_err(|err| LivecheckError::ConfigMalformed {
        path: config_path.to_path_buf(),
        details: err.to_string(),
    })
}
