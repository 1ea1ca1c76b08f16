//! Process wide settings, read once at startup.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Everything configurable about a fontprep process.
///
/// Loaded from YAML; any field left out takes its default.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub tools: ToolsConfig,
}

/// Where working copies, originals and derived files live.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            root: PathBuf::from("/tmp"),
            prefix: "font_".to_string(),
        }
    }
}

/// One external program and how to call it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ToolConfig {
    pub program: String,
    /// Passed before any per-call arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Added to the inherited environment
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ToolConfig {
    fn new(program: &str, args: &[&str]) -> Self {
        ToolConfig {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: Default::default(),
        }
    }
}

/// The wrapper that bounds every tool's run time, `timeout(1)` by default.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TimeoutConfig {
    pub program: String,
    /// Duration in the form `timeout(1)` expects, e.g. `10m`
    pub budget: String,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            program: "timeout".to_string(),
            budget: "10m".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    /// None runs tools without a time limit
    pub timeout: Option<TimeoutConfig>,
    pub autohint: ToolConfig,
    pub lookup_repair: ToolConfig,
    pub woff2: ToolConfig,
    pub eot: ToolConfig,
    pub svg_cleanup: ToolConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        let mut eot = ToolConfig::new("wine", &["/opt/eotfast/EOTFAST-1.EXE"]);
        eot.env
            .insert("WINEDLLOVERRIDES".to_string(), "t2embed.dll=n".to_string());
        ToolsConfig {
            timeout: Some(TimeoutConfig::default()),
            autohint: ToolConfig::new("ttfautohint", &["--windows-compatibility"]),
            lookup_repair: ToolConfig::new("/opt/fontprep/helper/fix_lookups.ff", &[]),
            woff2: ToolConfig::new("/opt/woff2/woff2_compress", &[]),
            eot,
            svg_cleanup: ToolConfig::new(
                "scour",
                &["--indent=none", "--remove-metadata", "--quiet"],
            ),
        }
    }
}

impl Config {
    /// Read configuration from `file`, or use the defaults if there isn't one.
    pub fn load(file: Option<&Path>) -> Result<Config, Error> {
        let Some(file) = file else {
            return Ok(Config::default());
        };
        let yml = fs::read_to_string(file).map_err(|e| Error::file_io(file, e))?;
        let config = serde_yaml::from_str(&yml).map_err(|source| Error::Config {
            path: file.to_path_buf(),
            source,
        })?;
        log::info!("Loaded configuration from {file:?}");
        Ok(config)
    }
}
