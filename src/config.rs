/*
 * Copyright 2025 Oxide Computer Company
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "gnmiconf.toml";

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    device: HashMap<String, ConfigFileDevice>,
}

impl ConfigFile {
    pub fn device(&self, name: &str) -> Result<&ConfigFileDevice> {
        if let Some(cfd) = self.device.get(name) {
            Ok(cfd)
        } else {
            bail!("could not find device named {name:?}");
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileDevice {
    snapshot: PathBuf,
}

impl ConfigFileDevice {
    pub fn snapshot(&self) -> &Path {
        &self.snapshot
    }
}

pub fn parse(s: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(s)?)
}

pub fn load() -> Result<ConfigFile> {
    let f = std::fs::read_to_string(CONFIG_FILE)
        .map_err(|e| anyhow!("reading {CONFIG_FILE:?}: {e}"))?;
    parse(&f)
}
