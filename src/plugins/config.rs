use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

use crate::plugins::items::ItemTag;
use crate::plugins::shape::Rotation;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read inventory config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse RON: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("max_columns must be at least 1 (total_slots = {total_slots})")]
    NoColumns { total_slots: usize },
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepopulatedItem {
    pub item: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

/// Layout and seed contents of one inventory. Attach to an entity to have
/// [`InventoryPlugin`](crate::plugins::inventory::InventoryPlugin) build an
/// inventory for it; changing it later re-initializes that inventory.
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryConfig {
    pub total_slots: usize,
    pub max_columns: usize,
    #[serde(default)]
    pub default_tags: BTreeSet<ItemTag>,
    #[serde(default)]
    pub rotation_priority: Rotation,
    #[serde(default)]
    pub prepopulate: Vec<PrepopulatedItem>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self::new(40, 10)
    }
}

impl InventoryConfig {
    pub fn new(total_slots: usize, max_columns: usize) -> Self {
        Self {
            total_slots,
            max_columns,
            default_tags: BTreeSet::new(),
            rotation_priority: Rotation::Deg0,
            prepopulate: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: impl Into<String>, quantity: u32) -> Self {
        self.prepopulate.push(PrepopulatedItem { item: item.into(), quantity });
        self
    }

    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::de::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_columns == 0 {
            return Err(ConfigError::NoColumns { total_slots: self.total_slots });
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.total_slots.div_ceil(self.max_columns.max(1))
    }
}
