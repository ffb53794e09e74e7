use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;

/// One named connector: its DRM sysfs name, its EDID blob path, and the name
/// `xrandr` knows it by. Loaded from the connector-facts JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct Connector {
    pub drm_connector: String,
    #[serde(default)]
    pub edid: String,
    pub xrandr_connector: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrmFacts {
    #[serde(default)]
    pub ignored_outputs: Vec<String>,
    pub primary: Option<Connector>,
    pub secondary: Option<Connector>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DrmModel {
    pub drm: DrmFacts,
}

/// Load connector facts from the configured JSON facts file.
pub fn load_facts(path: &Path) -> anyhow::Result<DrmFacts> {
    let content = std::fs::read_to_string(path)?;
    let model: DrmModel = serde_json::from_str(&content)?;
    Ok(model.drm)
}

fn connector_status_paths(card_glob: &str, drm_connector: &str) -> Vec<PathBuf> {
    let pattern = format!("{card_glob}{drm_connector}/status");
    glob_paths(&pattern)
}

/// A tiny hand-rolled glob over a single `*` wildcard, matching the one shape
/// `card*<connector>/status` needs; avoids pulling in a glob crate for this.
fn glob_paths(pattern: &str) -> Vec<PathBuf> {
    let Some((prefix, suffix)) = pattern.split_once('*') else {
        return vec![PathBuf::from(pattern)];
    };
    let prefix_path = Path::new(prefix);
    let Some(parent) = prefix_path.parent() else {
        return Vec::new();
    };
    let stem = prefix_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let Ok(entries) = std::fs::read_dir(parent) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name();
            let name = name.to_str()?;
            if name.starts_with(stem) {
                Some(parent.join(format!("{name}{suffix}")))
            } else {
                None
            }
        })
        .collect()
}

/// Poll `edid` beside a `status` file every second until it holds data.
async fn wait_for_edid(status_path: &Path) {
    let edid_path = status_path.with_file_name("edid");
    loop {
        if let Ok(bytes) = tokio::fs::read(&edid_path).await {
            if !bytes.is_empty() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

async fn reconfigure_output(screen_index: u32, connector: &Connector) {
    let display = format!(":0.{screen_index}");
    let result = Command::new("xrandr")
        .args(["-d", &display, "--output", &connector.xrandr_connector, "--auto", "--primary"])
        .status()
        .await;
    if let Err(err) = result {
        tracing::warn!(%err, output = %connector.xrandr_connector, "xrandr invocation failed");
    }
}

/// Poll `xrandr -d <display> --listactivemonitors` until an active mode
/// (a line containing `*`) appears, retrying once per second.
pub async fn wait_for_active_mode(display: &str) {
    loop {
        let output = Command::new("xrandr")
            .args(["-d", display, "--listactivemonitors"])
            .output()
            .await;
        if let Ok(output) = output {
            let text = String::from_utf8_lossy(&output.stdout);
            if text.lines().any(|line| line.contains('*')) {
                return;
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// Reconfigure primary (screen 0) and secondary (screen 1) outputs for any
/// connector reported as connected in sysfs.
pub async fn hotplug(card_glob: &str, facts: &DrmFacts) {
    for (index, connector) in [(0u32, &facts.primary), (1u32, &facts.secondary)] {
        let Some(connector) = connector else { continue };
        for status_path in connector_status_paths(card_glob, &connector.drm_connector) {
            let Ok(status) = tokio::fs::read_to_string(&status_path).await else {
                continue;
            };
            if !status.starts_with("connected") {
                continue;
            }
            wait_for_edid(&status_path).await;
            reconfigure_output(index, connector).await;
            wait_for_active_mode(&format!(":0.{index}")).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_facts_parses_two_connectors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drm.json");
        std::fs::write(
            &path,
            r#"{"drm": {"primary": {"drm_connector": "HDMI-A-1", "edid": "", "xrandr_connector": "HDMI-1"}, "secondary": null}}"#,
        )
        .unwrap();
        let facts = load_facts(&path).unwrap();
        assert_eq!(facts.primary.unwrap().xrandr_connector, "HDMI-1");
        assert!(facts.secondary.is_none());
    }

    #[test]
    fn glob_paths_matches_card_wildcard() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("card0-HDMI-A-1")).unwrap();
        std::fs::create_dir_all(dir.path().join("card1-DP-1")).unwrap();
        let pattern = format!("{}/card*", dir.path().display());
        let matches = glob_paths(&format!("{pattern}-HDMI-A-1/status"));
        assert_eq!(matches.len(), 1);
    }
}
