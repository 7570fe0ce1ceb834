//! Loads one `SkuConfig` per `*.toml` file in a configuration directory
//! (spec §4.2: "file layout is an implementation detail; the loader's
//! contract is what matters").

use crate::error::SkuConfigError;
use crate::types::SkuConfig;
use std::collections::HashMap;
use std::path::Path;

/// All SKU configurations loaded at SPM startup, keyed by `SkuConfig::name`.
#[derive(Debug, Clone)]
pub struct SkuRegistry {
    skus: HashMap<String, SkuConfig>,
}

impl SkuRegistry {
    /// Read every `*.toml` file directly under `dir`, each describing one
    /// SKU. Sub-directories are not traversed.
    pub fn load_dir(dir: &Path) -> Result<Self, SkuConfigError> {
        let mut skus = HashMap::new();
        let entries = std::fs::read_dir(dir).map_err(|source| SkuConfigError::Io { path: dir.display().to_string(), source })?;

        for entry in entries {
            let entry = entry.map_err(|source| SkuConfigError::Io { path: dir.display().to_string(), source })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let raw = std::fs::read_to_string(&path).map_err(|source| SkuConfigError::Io { path: path.display().to_string(), source })?;
            let config: SkuConfig = toml::from_str(&raw).map_err(|source| SkuConfigError::Parse { path: path.display().to_string(), source })?;
            tracing::info!(sku = %config.name, path = %path.display(), "loaded SKU configuration");
            skus.insert(config.name.clone(), config);
        }

        Ok(Self { skus })
    }

    /// Look up a SKU by name.
    pub fn get(&self, sku: &str) -> Result<&SkuConfig, SkuConfigError> {
        self.skus.get(sku).ok_or_else(|| SkuConfigError::UnknownSku(sku.to_string()))
    }

    /// Iterate over every loaded SKU.
    pub fn iter(&self) -> impl Iterator<Item = &SkuConfig> {
        self.skus.values()
    }

    /// Number of SKUs loaded.
    pub fn len(&self) -> usize {
        self.skus.len()
    }

    /// Whether no SKUs were loaded.
    pub fn is_empty(&self) -> bool {
        self.skus.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_sku(dir: &Path, name: &str) {
        let path = dir.join(format!("{name}.toml"));
        let mut file = std::fs::File::create(path).unwrap();
        write!(
            file,
            r#"
name = "{name}"
auth_passwords = ["test_password"]
dice_leaf_label = "SigningKey/Dice/v0"

[[ca_descriptors]]
key_label = "SigningKey/Dice/v0"
endorsing_key_label = "CaKey/Dice/v0"
template_reference = "dice_leaf_v0"

[token_seeds.LOW_SECURITY]
kdf_type = "Raw"
hsm_key_label = "LowSecSeed"
"#
        )
        .unwrap();
    }

    #[test]
    fn loads_every_toml_file_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_sku(dir.path(), "sival");
        write_sku(dir.path(), "cr01");

        let registry = SkuRegistry::load_dir(dir.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("sival").is_ok());
        assert!(registry.get("cr01").is_ok());
    }

    #[test]
    fn unknown_sku_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_sku(dir.path(), "sival");
        let registry = SkuRegistry::load_dir(dir.path()).unwrap();
        assert!(matches!(registry.get("nope"), Err(SkuConfigError::UnknownSku(_))));
    }

    #[test]
    fn non_toml_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_sku(dir.path(), "sival");
        std::fs::write(dir.path().join("README.md"), "not a sku").unwrap();
        let registry = SkuRegistry::load_dir(dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
    }
}
