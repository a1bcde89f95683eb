//! Configuration management
//!
//! Settings live in `<tally_dir>/settings.json`:
//! ```json
//! {
//!   "import": { "batchSize": 50, "delimiter": ",", "skipRows": 0 },
//!   "importProfiles": { "bank": { ... } }
//! }
//! ```
//! Fields this crate does not manage are kept as they are when saving.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::ImportProfile;

pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Overrides `import.batchSize`
pub const BATCH_SIZE_ENV: &str = "TALLY_BATCH_SIZE";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    import: ImportSettings,
    #[serde(default)]
    import_profiles: BTreeMap<String, ImportProfile>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Defaults for reading CSV files and submitting batches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Lines before the header row to ignore (bank preambles)
    #[serde(default)]
    pub skip_rows: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delimiter: default_delimiter(),
            skip_rows: 0,
        }
    }
}

impl ImportSettings {
    /// The delimiter as the single byte the CSV reader needs
    pub fn delimiter_byte(&self) -> Result<u8> {
        match self.delimiter.as_bytes() {
            [b] => Ok(*b),
            _ if self.delimiter == "\\t" => Ok(b'\t'),
            _ => anyhow::bail!("Delimiter must be a single ASCII character, got '{}'", self.delimiter),
        }
    }
}

/// Tally configuration (the parts of settings.json this crate manages)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub import: ImportSettings,
    pub import_profiles: BTreeMap<String, ImportProfile>,
}

impl Config {
    /// Load config from the tally directory.
    ///
    /// Every stored profile is validated; one bad profile fails the load
    /// with its name in the error.
    pub fn load(tally_dir: &Path) -> Result<Self> {
        let settings = read_settings(tally_dir)?;

        for (name, profile) in &settings.import_profiles {
            profile
                .validate()
                .with_context(|| format!("Import profile '{}' is invalid", name))?;
        }

        let mut import = settings.import;
        if let Ok(value) = std::env::var(BATCH_SIZE_ENV) {
            import.batch_size = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer, got '{}'", BATCH_SIZE_ENV, value))?;
        }
        if import.batch_size == 0 {
            anyhow::bail!("Batch size must be at least 1");
        }

        Ok(Self {
            import,
            import_profiles: settings.import_profiles,
        })
    }

    /// Save config, keeping settings this crate does not manage
    pub fn save(&self, tally_dir: &Path) -> Result<()> {
        for (name, profile) in &self.import_profiles {
            profile
                .validate()
                .with_context(|| format!("Import profile '{}' is invalid", name))?;
        }

        let mut settings = read_settings(tally_dir)?;
        settings.import = self.import.clone();
        settings.import_profiles = self.import_profiles.clone();

        std::fs::create_dir_all(tally_dir)?;
        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(tally_dir.join("settings.json"), content)?;
        Ok(())
    }
}

fn read_settings(tally_dir: &Path) -> Result<SettingsFile> {
    let settings_path = tally_dir.join("settings.json");
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", settings_path.display()))
}
