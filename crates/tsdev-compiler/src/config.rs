use std::{io::Read, path::Path};

use serde::Deserialize;

/// Default source extensions recognized by the loader hook when
/// `extensions` is not configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".tsx", ".ts", ".jsx", ".mjs", ".cjs", ".js"];

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct EsbuildConfig {
    #[serde(rename = "resolveExtensions")]
    pub resolve_extensions: Option<Vec<String>>,
}

/// Per-workspace options, read once from the workspace root's
/// `package.json` under the `"tsdev"` key.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct ProjectConfig {
    pub extensions: Option<Vec<String>>,
    #[serde(default)]
    pub ignore: Vec<String>,
    pub esbuild: Option<EsbuildConfig>,
}

impl ProjectConfig {
    /// Extensions to enumerate, honoring the `esbuild.resolveExtensions`
    /// alias kept for compatibility with the tool this config shape was
    /// modeled on, falling back to [`DEFAULT_EXTENSIONS`].
    pub fn extensions(&self) -> Vec<String> {
        if let Some(extensions) = &self.extensions {
            return extensions.clone();
        }
        if let Some(resolve) = self
            .esbuild
            .as_ref()
            .and_then(|e| e.resolve_extensions.as_ref())
        {
            return resolve.clone();
        }
        DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
    }

    /// Reads the `"tsdev"` key out of `package.json` at `manifest_path`,
    /// tolerating `//` and `/* */` comments the same way the manifest
    /// itself is allowed to contain them.
    pub fn load(manifest_path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(manifest_path)?;
        let mut stripped = String::new();
        json_comments::StripComments::new(raw.as_bytes()).read_to_string(&mut stripped)?;

        let manifest: serde_json::Value = serde_json::from_str(&stripped)?;
        let config = manifest
            .get("tsdev")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_key_absent() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("package.json");
        std::fs::write(&manifest, r#"{"name": "pkg"}"#).unwrap();

        let config = ProjectConfig::load(&manifest).unwrap();
        assert_eq!(
            config.extensions(),
            DEFAULT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn reads_tsdev_key_with_comments() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("package.json");
        std::fs::write(
            &manifest,
            r#"{
                // tool config
                "name": "pkg",
                "tsdev": {
                    "extensions": [".ts", ".tsx"],
                    "ignore": ["**/generated/**"]
                }
            }"#,
        )
        .unwrap();

        let config = ProjectConfig::load(&manifest).unwrap();
        assert_eq!(config.extensions(), vec![".ts", ".tsx"]);
        assert_eq!(config.ignore, vec!["**/generated/**"]);
    }

    #[test]
    fn esbuild_resolve_extensions_alias() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("package.json");
        std::fs::write(
            &manifest,
            r#"{"tsdev": {"esbuild": {"resolveExtensions": [".mts"]}}}"#,
        )
        .unwrap();

        let config = ProjectConfig::load(&manifest).unwrap();
        assert_eq!(config.extensions(), vec![".mts"]);
    }
}
