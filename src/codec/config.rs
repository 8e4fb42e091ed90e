//! Compile configuration: virtual base address and output size budget.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Address the game loads geometry files at.
pub const RAM_BASE: u32 = 0x8021_0000;

/// Largest geometry file a regular map may have.
pub const MAX_MAP_SIZE: usize = 0x30000;

/// Largest geometry file a battle stage may have.
pub const MAX_STAGE_SIZE: usize = 0x8000;

/// How large compiled geometry is allowed to get.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeBudget {
    Map,
    BattleStage,
    Custom(usize),
    Unlimited,
}

impl SizeBudget {
    /// Battle stages are the maps whose name contains `_bt`.
    pub fn for_map_name(name: &str) -> Self {
        if name.contains("_bt") {
            SizeBudget::BattleStage
        } else {
            SizeBudget::Map
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            SizeBudget::Map => Some(MAX_MAP_SIZE),
            SizeBudget::BattleStage => Some(MAX_STAGE_SIZE),
            SizeBudget::Custom(n) => Some(*n),
            SizeBudget::Unlimited => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SizeBudget::BattleStage => "battle map",
            _ => "map",
        }
    }

    /// Fail with [`Error::SizeLimit`] when `size` is over budget.
    pub fn check(&self, size: usize) -> Result<()> {
        match self.limit() {
            Some(limit) if size > limit => Err(Error::SizeLimit {
                kind: self.kind(),
                size,
                limit,
            }),
            _ => Ok(()),
        }
    }
}

/// Settings shared by the geometry compiler, decompiler and extractor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Address that file offset 0 is loaded at.
    pub virtual_base: u32,
    pub size_budget: SizeBudget,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            virtual_base: RAM_BASE,
            size_budget: SizeBudget::Map,
        }
    }
}

impl CompileConfig {
    /// Default settings with the budget picked from the map name.
    pub fn for_map(name: &str) -> Self {
        Self {
            size_budget: SizeBudget::for_map_name(name),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Pointer to a file offset.
    pub fn to_ptr(&self, offset: usize) -> u32 {
        self.virtual_base.wrapping_add(offset as u32)
    }

    /// File offset a pointer refers to; `at` is where the pointer was read.
    pub fn to_offset(&self, ptr: u32, at: usize) -> Result<usize> {
        ptr.checked_sub(self.virtual_base)
            .map(|o| o as usize)
            .ok_or_else(|| Error::corrupt(at, format!("pointer {:08X} below base {:08X}", ptr, self.virtual_base)))
    }
}
