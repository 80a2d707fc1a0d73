//! Volume path helpers.

use std::path::Path;

use crate::config::OpsConfig;

/// Join two volume path segments with a single `/`.
pub fn path_join(base: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    if base.is_empty() {
        return name.to_string();
    }
    if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Last segment of a volume path.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Parent of a volume path, `None` at the root.
pub fn parent_path(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) if trimmed.len() > 1 => Some("/"),
        Some(0) => None,
        Some(idx) => Some(&trimmed[..idx]),
        None if trimmed.is_empty() => None,
        None => Some(""),
    }
}

/// Whether `dir` holds the configuration artifact that marks a volume root.
pub fn is_volume_root(dir: &Path, config: &OpsConfig) -> bool {
    dir.is_dir() && config.volume_config_path(dir).is_file()
}
