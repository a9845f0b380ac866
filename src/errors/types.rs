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

use std::fmt;
use std::io;
use std::path::PathBuf;

/// All error conditions the image builder can report.
///
/// Every error is fatal: the build aborts on the first one and no output
/// file is written.
#[derive(Debug)]
pub enum BuildError {
    BlueprintParse(String),

    File { path: PathBuf, source: io::Error },

    BadElf(&'static str),

    BadRelocationSection(&'static str),

    UnsupportedRelocation(u32),

    UnknownModuleType(String),

    Compressor(String),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::BlueprintParse(msg) => write!(f, "blueprint parse error: {}", msg),
            BuildError::File { path, source } => write!(f, "{}: {}", path.display(), source),
            BuildError::BadElf(detail) => write!(f, "bad ELF image: {}", detail),
            BuildError::BadRelocationSection(detail) => {
                write!(f, "bad relocation section: {}", detail)
            }
            BuildError::UnsupportedRelocation(rtype) => {
                write!(f, "unsupported relocation type {}", rtype)
            }
            BuildError::UnknownModuleType(name) => {
                write!(f, "unknown module type '{}'", name)
            }
            BuildError::Compressor(msg) => write!(f, "compression failed: {}", msg),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::File { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl BuildError {
    pub fn category(&self) -> &'static str {
        match self {
            BuildError::BlueprintParse(_) => "blueprint",
            BuildError::File { .. } => "io",
            BuildError::BadElf(_) => "elf",
            BuildError::BadRelocationSection(_) | BuildError::UnsupportedRelocation(_) => {
                "relocation"
            }
            BuildError::UnknownModuleType(_) => "module",
            BuildError::Compressor(_) => "compress",
        }
    }
}

pub type BuildResult<T> = Result<T, BuildError>;
