//! Platform-specific paths for bundles and configuration.
//!
//! This module provides cross-platform paths for storing user bundles,
//! configuration files, and locating system bundles.
//!
//! # Directory Structure
//!
//! - **User bundles**: `~/.config/synthpod/bundles/` (Linux), `~/Library/Application Support/synthpod/bundles/` (macOS), `%APPDATA%\synthpod\bundles\` (Windows)
//! - **User config**: `~/.config/synthpod/` (Linux), `~/Library/Application Support/synthpod/` (macOS), `%APPDATA%\synthpod\` (Windows)
//! - **System bundles**: `/usr/share/synthpod/bundles/` (Linux), `/Library/Application Support/synthpod/bundles/` (macOS)
//!
//! # Example
//!
//! ```rust,no_run
//! use synthpod_config::paths;
//!
//! let bundles_dir = paths::user_bundles_dir();
//! println!("User bundles: {:?}", bundles_dir);
//!
//! if let Some(path) = paths::find_bundle("my_session") {
//!     println!("Found bundle at: {:?}", path);
//! }
//! ```

use std::path::PathBuf;

/// Application name used for directory paths.
const APP_NAME: &str = "synthpod";

/// Subdirectory name for bundles.
const BUNDLES_SUBDIR: &str = "bundles";

/// Returns the user-specific bundles directory.
///
/// # Platform Paths
///
/// - Linux: `~/.config/synthpod/bundles/`
/// - macOS: `~/Library/Application Support/synthpod/bundles/`
/// - Windows: `%APPDATA%\synthpod\bundles\`
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_bundles_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join(BUNDLES_SUBDIR)
}

/// Returns the user-specific configuration directory.
///
/// # Platform Paths
///
/// - Linux: `~/.config/synthpod/`
/// - macOS: `~/Library/Application Support/synthpod/`
/// - Windows: `%APPDATA%\synthpod\`
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the system-wide bundles directory.
///
/// This directory is typically read-only and contains factory bundles.
///
/// # Platform Paths
///
/// - Linux: `/usr/share/synthpod/bundles/`
/// - macOS: `/Library/Application Support/synthpod/bundles/`
/// - Windows: `%PROGRAMDATA%\synthpod\bundles\`
pub fn system_bundles_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/usr/share").join(APP_NAME).join(BUNDLES_SUBDIR)
    }
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Library/Application Support").join(APP_NAME).join(BUNDLES_SUBDIR)
    }
    #[cfg(target_os = "windows")]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData"))
            .join(APP_NAME)
            .join(BUNDLES_SUBDIR)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
            .join(BUNDLES_SUBDIR)
    }
}

/// Find a bundle file by name.
///
/// Searches in the following order:
/// 1. Current directory (if the path is a valid file)
/// 2. User bundles directory
/// 3. System bundles directory
///
/// The name can be:
/// - An absolute path to a TOML file
/// - A relative path to a TOML file
/// - A bundle name (with or without `.toml` extension)
///
/// # Example
///
/// ```rust,no_run
/// use synthpod_config::paths::find_bundle;
///
/// if let Some(path) = find_bundle("my_session") {
///     println!("Found: {:?}", path);
/// }
///
/// if let Some(path) = find_bundle("/path/to/my_session.toml") {
///     println!("Found: {:?}", path);
/// }
/// ```
pub fn find_bundle(name: &str) -> Option<PathBuf> {
    let path = PathBuf::from(name);

    if path.is_file() {
        return Some(path);
    }

    let filename = if name.ends_with(".toml") {
        name.to_string()
    } else {
        format!("{}.toml", name)
    };

    let user_path = user_bundles_dir().join(&filename);
    if user_path.is_file() {
        return Some(user_path);
    }

    let system_path = system_bundles_dir().join(&filename);
    if system_path.is_file() {
        return Some(system_path);
    }

    None
}

/// Ensure the user bundles directory exists.
///
/// Creates the directory and any parent directories if they don't exist.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_user_bundles_dir() -> Result<PathBuf, crate::ConfigError> {
    let dir = user_bundles_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| crate::ConfigError::create_dir(&dir, e))?;
    }

    Ok(dir)
}

/// Ensure the user config directory exists.
///
/// Creates the directory and any parent directories if they don't exist.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_user_config_dir() -> Result<PathBuf, crate::ConfigError> {
    let dir = user_config_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| crate::ConfigError::create_dir(&dir, e))?;
    }

    Ok(dir)
}

/// List all bundle files in the user bundles directory.
///
/// Returns an empty vector if the directory doesn't exist or can't be read.
pub fn list_user_bundles() -> Vec<PathBuf> {
    list_bundles_in_dir(&user_bundles_dir())
}

/// List all bundle files in the system bundles directory.
///
/// Returns an empty vector if the directory doesn't exist or can't be read.
pub fn list_system_bundles() -> Vec<PathBuf> {
    list_bundles_in_dir(&system_bundles_dir())
}

/// List all available bundles (user + system).
///
/// User bundles are listed first, followed by system bundles.
/// Duplicate names are not filtered - the caller should handle precedence.
pub fn list_all_bundles() -> Vec<PathBuf> {
    let mut bundles = list_user_bundles();
    bundles.extend(list_system_bundles());
    bundles
}

/// Helper to list bundle files in a directory.
fn list_bundles_in_dir(dir: &PathBuf) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }

    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext == "toml")
                    .unwrap_or(false)
        })
        .collect()
}

/// Get the bundle name from a file path.
///
/// Extracts the file stem (filename without extension).
///
/// # Example
///
/// ```rust
/// use synthpod_config::paths::bundle_name_from_path;
/// use std::path::Path;
///
/// let name = bundle_name_from_path(Path::new("/path/to/my_session.toml"));
/// assert_eq!(name, Some("my_session".to_string()));
/// ```
pub fn bundle_name_from_path(path: &std::path::Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_user_bundles_dir() {
        let dir = user_bundles_dir();
        let dir_str = dir.to_string_lossy();
        assert!(dir_str.contains("synthpod") || dir_str.contains("bundles"));
    }

    #[test]
    fn test_user_config_dir() {
        let dir = user_config_dir();
        let dir_str = dir.to_string_lossy();
        assert!(dir_str.contains("synthpod"));
    }

    #[test]
    fn test_system_bundles_dir() {
        let dir = system_bundles_dir();
        let dir_str = dir.to_string_lossy();
        assert!(dir_str.contains("synthpod"));
    }

    #[test]
    fn test_find_bundle_by_path() {
        let temp_dir = TempDir::new().unwrap();
        let bundle_path = temp_dir.path().join("test.toml");
        fs::write(&bundle_path, "name = \"test\"").unwrap();

        let found = find_bundle(bundle_path.to_str().unwrap());
        assert!(found.is_some());
        assert_eq!(found.unwrap(), bundle_path);
    }

    #[test]
    fn test_find_bundle_not_found() {
        let found = find_bundle("nonexistent_bundle_12345");
        assert!(found.is_none());
    }

    #[test]
    fn test_list_bundles_in_dir() {
        let temp_dir = TempDir::new().unwrap();

        fs::write(temp_dir.path().join("bundle1.toml"), "").unwrap();
        fs::write(temp_dir.path().join("bundle2.toml"), "").unwrap();
        fs::write(temp_dir.path().join("not_a_bundle.txt"), "").unwrap();

        let bundles = list_bundles_in_dir(&temp_dir.path().to_path_buf());
        assert_eq!(bundles.len(), 2);
        assert!(bundles.iter().all(|p| p.extension().unwrap() == "toml"));
    }

    #[test]
    fn test_list_bundles_empty_dir() {
        let temp_dir = TempDir::new().unwrap();
        let bundles = list_bundles_in_dir(&temp_dir.path().to_path_buf());
        assert!(bundles.is_empty());
    }

    #[test]
    fn test_list_bundles_nonexistent_dir() {
        let bundles = list_bundles_in_dir(&PathBuf::from("/nonexistent/path/12345"));
        assert!(bundles.is_empty());
    }

    #[test]
    fn test_bundle_name_from_path() {
        let path = std::path::Path::new("/path/to/my_session.toml");
        assert_eq!(bundle_name_from_path(path), Some("my_session".to_string()));

        let path = std::path::Path::new("simple.toml");
        assert_eq!(bundle_name_from_path(path), Some("simple".to_string()));
    }

    #[test]
    fn test_ensure_user_bundles_dir() {
        let result = ensure_user_bundles_dir();
        let _ = result;
    }

    #[test]
    fn test_find_bundle_adds_extension() {
        let temp_dir = TempDir::new().unwrap();
        let bundle_path = temp_dir.path().join("mybundle.toml");
        fs::write(&bundle_path, "name = \"test\"").unwrap();

        let found = find_bundle(bundle_path.to_str().unwrap());
        assert!(found.is_some());
    }
}
