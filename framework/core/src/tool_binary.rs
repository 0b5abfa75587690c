use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};

/// Environment variable to override the path to `hdc`.
pub const PH_HDC_PATH_ENV: &str = "PH_HDC_PATH";
/// Environment variable to override the path to `trace_streamer`.
pub const PH_TRACE_STREAMER_PATH_ENV: &str = "PH_TRACE_STREAMER_PATH";
/// Environment variable to override the path to `bjc`.
pub const PH_BJC_PATH_ENV: &str = "PH_BJC_PATH";

/// Locate a host tool.
///
/// If `env_var` is set, its value is used as the path to the tool and must exist. If it is not
/// set, or is set to the bare tool name, the tool is looked up in the user's `PATH`.
pub fn tool_path(env_var: &str, name: &str) -> anyhow::Result<PathBuf> {
    match env::var(env_var).ok().as_deref() {
        Some("") => {
            bail!("'{env_var}' set to empty string");
        }
        Some(value) if value == name => which_tool(env_var, name),
        None => which_tool(env_var, name),
        Some(path) => {
            let tool_path = PathBuf::from(path);
            if !tool_path.exists() {
                bail!(
                    "Path to {name} overridden with '{env_var}={path}' but that path doesn't exist",
                    path = tool_path.display()
                );
            }
            Ok(tool_path)
        }
    }
}

fn which_tool(env_var: &str, name: &str) -> anyhow::Result<PathBuf> {
    log::debug!("'{env_var}' is not a path so looking for '{name}' in user's 'PATH'");
    which::which(name).with_context(|| {
        format!("{name} not found in PATH. Please install it or set '{env_var}' to the correct path.")
    })
}

/// Path to the `hdc` device connector.
pub fn hdc_path() -> anyhow::Result<PathBuf> {
    tool_path(PH_HDC_PATH_ENV, "hdc")
}

/// Path to `trace_streamer`, if available. Captures are kept unconverted without it.
pub fn trace_streamer_path() -> Option<PathBuf> {
    match tool_path(PH_TRACE_STREAMER_PATH_ENV, "trace_streamer") {
        Ok(path) => Some(path),
        Err(e) => {
            log::warn!("Captures will not be converted to databases: {e:#}");
            None
        }
    }
}

/// Path to the `bjc` coverage tool.
pub fn bjc_path() -> anyhow::Result<PathBuf> {
    tool_path(PH_BJC_PATH_ENV, "bjc")
}

#[cfg(test)]
mod tests {
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt as _;

    use tempfile::{NamedTempFile, TempDir};

    use super::*;

    // Each test uses its own variable so that tests can run in parallel.

    #[test]
    fn should_not_get_tool_path_if_not_exist() {
        env::set_var("PH_TEST_TOOL_MISSING", "/non/existent/path/to/tool");
        let result = tool_path("PH_TEST_TOOL_MISSING", "tool");
        assert!(result.is_err());
    }

    #[test]
    fn should_not_accept_empty_override() {
        env::set_var("PH_TEST_TOOL_EMPTY", "");
        assert!(tool_path("PH_TEST_TOOL_EMPTY", "tool").is_err());
    }

    #[test]
    fn should_get_tool_path_from_env() {
        let temp = NamedTempFile::new().expect("failed to create temp file");
        let test_path = temp.path().to_str().expect("failed to get temp file path");
        env::set_var("PH_TEST_TOOL_SET", test_path);
        let result = tool_path("PH_TEST_TOOL_SET", "tool").expect("failed to get tool path");
        assert_eq!(result, PathBuf::from(test_path));
    }

    #[cfg(unix)]
    #[test]
    fn should_find_tool_on_path() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let tool = temp.path().join("ph-test-tool-on-path");
        std::fs::write(&tool, "#!/bin/sh\n").expect("failed to create tool");
        let mut perms = std::fs::metadata(&tool).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&tool, perms).unwrap();

        let result = which::which_in("ph-test-tool-on-path", Some(temp.path()), temp.path())
            .expect("failed to find tool");
        assert_eq!(result, tool);
    }

    #[test]
    fn should_not_find_unknown_tool() {
        env::remove_var("PH_TEST_TOOL_UNKNOWN");
        let result = tool_path("PH_TEST_TOOL_UNKNOWN", "ph-definitely-not-installed-tool");
        assert!(result.is_err());
    }
}
