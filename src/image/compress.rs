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

//! LZ4 frame compression of the payload.
//!
//! The kickstart decompresses the payload at boot with a fixed-size
//! scratch-free frame decoder, so blocks must be independent. Compression
//! runs at the maximum HC level; the build is offline and size wins.

use std::io::Write;

use lz4::{BlockMode, EncoderBuilder};

use crate::errors::{BuildError, BuildResult};

/// liblz4 `LZ4HC_CLEVEL_MAX`.
const COMPRESSION_LEVEL: u32 = 12;

pub fn compress_payload(payload: &[u8]) -> BuildResult<Vec<u8>> {
    let output = Vec::with_capacity(payload.len() / 2 + 4096);

    let mut encoder = EncoderBuilder::new()
        .level(COMPRESSION_LEVEL)
        .block_mode(BlockMode::Independent)
        .build(output)
        .map_err(|e| BuildError::Compressor(e.to_string()))?;

    encoder
        .write_all(payload)
        .map_err(|e| BuildError::Compressor(e.to_string()))?;

    let (output, result) = encoder.finish();
    result.map_err(|e| BuildError::Compressor(e.to_string()))?;

    Ok(output)
}
