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

//! FreeBSD loader metadata.
//!
//! The kernel consumes a word-aligned stream of `(type, size, payload)`
//! records at boot. Values that depend on the final layout (currently only
//! KERNEND) are reserved at emit time and resolved by the fixup pass once
//! the image extent is known.

/// Record type codes understood by the FreeBSD loader.
pub mod modinfo {
    pub const MODINFO_END: u32 = 0x0000;
    pub const MODINFO_NAME: u32 = 0x0001;
    pub const MODINFO_TYPE: u32 = 0x0002;
    pub const MODINFO_ADDR: u32 = 0x0003;
    pub const MODINFO_SIZE: u32 = 0x0004;
    pub const MODINFO_METADATA: u32 = 0x8000;
}

/// Subtypes carried under `MODINFO_METADATA`.
pub mod modinfomd {
    pub const MODINFOMD_HOWTO: u32 = 0x0001;
    pub const MODINFOMD_ENVP: u32 = 0x0002;
    pub const MODINFOMD_KERNEND: u32 = 0x0004;
    pub const MODINFOMD_DTBP: u32 = 0x0010;
}

/// What a deferred record's payload should become once the layout is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixupIntent {
    /// Virtual address of the first byte past the metadata block.
    Kernend,
}

#[derive(Debug)]
pub struct MetadataFixup {
    /// Payload position within the metadata stream, in words.
    pub word_offset: usize,
    pub intent: FixupIntent,
}

#[derive(Debug, Default)]
pub struct MetadataWriter {
    words: Vec<u32>,
    fixups: Vec<MetadataFixup>,
}

impl MetadataWriter {
    pub fn new() -> Self {
        MetadataWriter::default()
    }

    /// Append a record: type word, size word, then the payload packed into
    /// words with the final word zero-padded.
    pub fn write_record(&mut self, rtype: u32, data: &[u8]) {
        self.words.push(rtype);
        self.words.push(data.len() as u32);

        for chunk in data.chunks(4) {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.words.push(u32::from_le_bytes(word));
        }
    }

    pub fn write_record32(&mut self, rtype: u32, value: u32) {
        self.write_record(rtype, &value.to_le_bytes());
    }

    /// Append a one-word record whose payload is resolved later. The
    /// reserved word is zero until the fixup pass runs.
    pub fn write_deferred32(&mut self, rtype: u32, intent: FixupIntent) {
        self.words.push(rtype);
        self.words.push(4);
        self.fixups.push(MetadataFixup {
            word_offset: self.words.len(),
            intent,
        });
        self.words.push(0);
    }

    pub fn byte_len(&self) -> usize {
        self.words.len() * 4
    }

    pub fn fixups(&self) -> &[MetadataFixup] {
        &self.fixups
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        for word in &self.words {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out
    }
}

/// A decoded `(type, payload)` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub rtype: u32,
    pub data: Vec<u8>,
}

/// Decode a metadata stream up to and including its `MODINFO_END` record.
/// Returns `None` on truncation or a missing terminator.
pub fn decode_records(data: &[u8]) -> Option<Vec<MetadataRecord>> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    loop {
        if offset + 8 > data.len() {
            return None;
        }
        let rtype = u32::from_le_bytes(data[offset..offset + 4].try_into().ok()?);
        let size = u32::from_le_bytes(data[offset + 4..offset + 8].try_into().ok()?) as usize;
        offset += 8;

        let padded = size.div_ceil(4) * 4;
        if offset + padded > data.len() {
            return None;
        }
        records.push(MetadataRecord {
            rtype,
            data: data[offset..offset + size].to_vec(),
        });
        offset += padded;

        if rtype == modinfo::MODINFO_END {
            return Some(records);
        }
    }
}
