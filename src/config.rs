// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Analysis-group configuration: a YAML file listing named groups and the
//! criteria that select their jobs and nodes.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "hpcq";
const CONFIG_FILE_NAME: &str = "hpcq.yaml";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub analysis_groups: Vec<GroupDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct GroupDefinition {
    /// Shown as the tab / section label.
    pub name: String,
    pub criteria: Criteria,
}

/// Selection criteria for one analysis group. Every dimension defaults to
/// match-all; unknown keys are rejected so a typo cannot silently widen a
/// group.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Criteria {
    #[serde(default)]
    pub partitions: Criterion,
    #[serde(default)]
    pub users: Criterion,
    #[serde(default)]
    pub nodes: Criterion,
    #[serde(default)]
    pub gpu_types: Criterion,
    /// Free-form predicate over job records, binding name `queue`.
    #[serde(default)]
    pub custom_queue_mask: Option<String>,
    /// Free-form predicate over node records, binding name `capacity`.
    #[serde(default)]
    pub custom_capacity_mask: Option<String>,
}

/// One list-valued criterion: either the wildcard (`"*"` or absent) or a
/// set of accepted values.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum Criterion {
    #[default]
    All,
    Any(Vec<String>),
}

impl Criterion {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl<'de> Deserialize<'de> for Criterion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::One(s) if s == "*" => Self::All,
            Raw::One(s) => Self::Any(vec![s]),
            Raw::Many(values) => Self::Any(values),
        })
    }
}

/// Load the configuration, from `path_override` when given (the file must
/// then exist), else from `./hpcq.yaml`, else from the per-user config
/// directory.
pub fn load(path_override: Option<PathBuf>) -> Result<Config> {
    let path = match path_override {
        Some(path) => {
            let path = expand_path(path);
            if !path.exists() {
                bail!("config file not found at {}", path.display());
            }
            path
        }
        None => default_search().with_context(|| {
            format!(
                "no configuration file found; create ./{CONFIG_FILE_NAME} or pass --config"
            )
        })?,
    };
    read_config_file(&path)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.analysis_groups.is_empty() {
        bail!("configuration defines no analysis groups");
    }
    for (idx, group) in config.analysis_groups.iter().enumerate() {
        if group.name.trim().is_empty() {
            bail!("analysis_groups[{}] has an empty name", idx + 1);
        }
    }
    Ok(())
}

fn default_search() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    let fallback = dirs::config_dir()?.join(APP_DIR_NAME).join(CONFIG_FILE_NAME);
    fallback.exists().then_some(fallback)
}

fn expand_path(path: PathBuf) -> PathBuf {
    let raw = path.to_string_lossy().to_string();
    let expanded = shellexpand::tilde(&raw);
    PathBuf::from(expanded.as_ref())
}
