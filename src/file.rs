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

//! File access helpers. All errors carry the offending path.

use std::fs;
use std::path::Path;

use crate::errors::{BuildError, BuildResult};

pub fn read_file(path: &Path) -> BuildResult<Vec<u8>> {
    fs::read(path).map_err(|source| BuildError::File {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_text_file(path: &Path) -> BuildResult<String> {
    fs::read_to_string(path).map_err(|source| BuildError::File {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_file(path: &Path, data: &[u8]) -> BuildResult<()> {
    fs::write(path, data).map_err(|source| BuildError::File {
        path: path.to_path_buf(),
        source,
    })
}
