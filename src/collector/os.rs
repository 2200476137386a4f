//! OS Identity Detection
//!
//! Reads `/etc/os-release` and `uname` so recommendations reference the
//! correct distribution and package manager. Detection failures leave fields
//! unset; they never abort the run.

use tokio::process::Command;
use tracing::debug;

use crate::types::{OsInfo, PackageManager};

const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Detect the running OS identity.
pub async fn detect() -> OsInfo {
    let mut info = match tokio::fs::read_to_string(OS_RELEASE_PATH).await {
        Ok(contents) => parse_os_release(&contents),
        Err(e) => {
            debug!("Could not read {}: {}", OS_RELEASE_PATH, e);
            OsInfo::default()
        }
    };

    if let Ok(output) = Command::new("uname").arg("-sr").output().await
        && output.status.success()
    {
        let kernel = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !kernel.is_empty() {
            info.kernel = Some(kernel);
        }
    }

    info
}

/// Parse os-release KEY=value lines. Values may be quoted.
fn parse_os_release(contents: &str) -> OsInfo {
    let mut info = OsInfo::default();
    let mut id_like = Vec::new();

    for line in contents.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_string();

        match key.trim() {
            "NAME" => info.name = Some(value),
            "PRETTY_NAME" => info.pretty_name = Some(value),
            "ID" => info.id = Some(value),
            "ID_LIKE" => id_like = value.split_whitespace().map(str::to_string).collect(),
            _ => {}
        }
    }

    // ID takes precedence over ID_LIKE for the package manager hint.
    info.package_manager = info
        .id
        .as_deref()
        .and_then(PackageManager::from_os_id)
        .or_else(|| {
            id_like
                .iter()
                .find_map(|token| PackageManager::from_os_id(token))
        });

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_os_release_ubuntu() {
        let contents = r#"
NAME="Ubuntu"
VERSION="22.04.4 LTS (Jammy Jellyfish)"
ID=ubuntu
ID_LIKE=debian
PRETTY_NAME="Ubuntu 22.04.4 LTS"
"#;
        let info = parse_os_release(contents);
        assert_eq!(info.name.as_deref(), Some("Ubuntu"));
        assert_eq!(info.pretty_name.as_deref(), Some("Ubuntu 22.04.4 LTS"));
        assert_eq!(info.package_manager, Some(PackageManager::Apt));
        assert_eq!(info.display_name(), "Ubuntu 22.04.4 LTS");
    }

    #[test]
    fn test_parse_os_release_id_like_fallback() {
        let contents = "NAME=Derived\nID=derived\nID_LIKE=\"arch\"\n";
        let info = parse_os_release(contents);
        assert_eq!(info.package_manager, Some(PackageManager::Pacman));
    }

    #[test]
    fn test_parse_os_release_unknown() {
        let info = parse_os_release("ID=plan9\n");
        assert_eq!(info.package_manager, None);
        assert_eq!(info.display_name(), "unknown Linux");
    }
}
