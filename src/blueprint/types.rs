// NØNOS Operating System
// Copyright (C) 2026 NØNOS Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The blueprint value tree.
//!
//! Order matters everywhere: modules are placed in declaration order, and
//! each module's metadata entries are emitted in declaration order.

use std::path::{Path, PathBuf};

use crate::errors::BuildResult;

/// One metadata directive attached to a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleMetadata {
    /// Device tree blob to place and point `MODINFOMD_DTBP` at.
    Dtb(PathBuf),
    /// Deferred `MODINFOMD_KERNEND` record.
    Kernend,
    /// `MODINFOMD_HOWTO` flags; kept textual until layout time so the
    /// C-style numeral parse failure is reported against the build.
    Howto(String),
    /// `key=value` pairs for the kernel environment, in order.
    Environment(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    /// Module type string as recorded in metadata, e.g. `"elf kernel"`.
    pub kind: String,
    pub path: PathBuf,
    pub metadata: Vec<ModuleMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blueprint {
    pub image_base: u32,
    pub kickstart: PathBuf,
    /// Position-independent executables staged above the kickstart with an
    /// entry table. No blueprint directive populates this yet; callers set
    /// it directly.
    pub init_modules: Vec<PathBuf>,
    pub modules: Vec<Module>,
    /// Present for future use; compression is currently unconditional.
    pub compress: bool,
}

impl Blueprint {
    pub fn new() -> Self {
        Blueprint {
            image_base: 0,
            kickstart: PathBuf::new(),
            init_modules: Vec::new(),
            modules: Vec::new(),
            compress: true,
        }
    }

    pub fn parse_file(path: &Path) -> BuildResult<Self> {
        super::parse::parse_file(path)
    }

    pub fn parse_str(text: &str) -> BuildResult<Self> {
        super::parse::parse_str(text)
    }
}

impl Default for Blueprint {
    fn default() -> Self {
        Blueprint::new()
    }
}
