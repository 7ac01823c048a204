//! Standard locations for selfmult configuration files

use std::path::PathBuf;

/// Directory holding selfmult configuration
///
/// Returns: `{user config dir}/selfmult`, or `./selfmult` when the platform
/// has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("selfmult")
}

/// Path of a config file (e.g. "processor.yaml") in [`default_config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_selfmult() {
        assert!(default_config_dir().ends_with("selfmult"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path("processor.yaml");
        assert!(path.ends_with("selfmult/processor.yaml"));
    }
}
