//! Compiler configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

/// What a store to a name that is neither a local nor a declared global does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreResolution {
    /// Write a global of that name
    #[default]
    Global,
    /// Declare a local in the innermost scope; top-level code of the main
    /// unit still writes a global
    ImplicitLocal,
}

/// Options fixed when an assembler is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Store resolution for unresolved names
    pub store_resolution: StoreResolution,
    /// Record the source line of every instruction
    pub emit_line_info: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            store_resolution: StoreResolution::Global,
            emit_line_info: true,
        }
    }
}

impl CompilerOptions {
    /// Parses options from TOML; missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| CompileError::Config(e.to_string()))
    }

    /// Loads options from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| CompileError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }
}
