use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::info;

use crate::ViewerError;

#[cfg(target_os = "macos")]
const LAUNCHERS: &[&str] = &["open"];
#[cfg(target_os = "windows")]
const LAUNCHERS: &[&str] = &["explorer"];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const LAUNCHERS: &[&str] = &["xdg-open", "sensible-browser", "firefox"];

/// `$BROWSER` when it resolves on `PATH`, otherwise the platform launcher.
pub fn find_launcher() -> Option<PathBuf> {
    let preferred = env::var("BROWSER").ok().filter(|value| !value.trim().is_empty());
    preferred
        .iter()
        .map(String::as_str)
        .chain(LAUNCHERS.iter().copied())
        .find_map(|candidate| which::which(candidate).ok())
}

pub fn file_url(path: &Path) -> Result<String, ViewerError> {
    let absolute = path
        .canonicalize()
        .map_err(|error| ViewerError::Browser(format!("{}: {error}", path.display())))?;
    let display = absolute.to_string_lossy().replace('\\', "/");
    if display.starts_with('/') {
        Ok(format!("file://{display}"))
    } else {
        Ok(format!("file:///{display}"))
    }
}

pub async fn open_in_browser(path: &Path) -> Result<(), ViewerError> {
    let launcher = find_launcher()
        .ok_or_else(|| ViewerError::Browser("no browser launcher found on PATH".to_string()))?;
    let url = file_url(path)?;

    let status = Command::new(&launcher)
        .arg(&url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|error| ViewerError::Browser(format!("{}: {error}", launcher.display())))?;

    if !status.success() {
        return Err(ViewerError::Browser(format!("{} exited with {status}", launcher.display())));
    }
    info!(event_name = "viewer.browser.opened", url = %url, "opened viewer in browser");
    Ok(())
}
