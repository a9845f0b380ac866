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

//! Segment placement.
//!
//! Two modes exist. Kernel mode copies `PT_LOAD` segments into the shared
//! payload buffer at `p_vaddr + kernel_delta`. Relocatable mode loads an
//! executable into its own buffer at a caller-chosen base and applies its
//! relocation sections, for the kickstart and init modules.

use std::path::Path;

use log::debug;

use crate::errors::{BuildError, BuildResult};

use super::read::ElfFile;
use super::reloc::apply_relocations;

/// Copy every `PT_LOAD` segment of a kernel ELF into `payload`.
///
/// Physical address `P` maps to payload offset `P - image_base`; the buffer
/// grows as needed, with the BSS tail left zero-filled. Returns the highest
/// physical address any segment's memory image reaches (at least `base`).
pub fn load_kernel_segments(
    elf: &ElfFile,
    kernel_delta: u32,
    image_base: u32,
    payload: &mut Vec<u8>,
    base: u32,
) -> BuildResult<u32> {
    let mut limit = base;

    for segment in elf.program_headers()? {
        if !segment.is_load() {
            continue;
        }
        if segment.p_memsz < segment.p_filesz {
            return Err(BuildError::BadElf("LOAD segment has p_memsz < p_filesz"));
        }

        // The delta is a wrapped physical-minus-virtual difference, so the
        // translation back to physical must wrap as well.
        let physaddr = segment.p_vaddr.wrapping_add(kernel_delta);
        if physaddr < image_base {
            return Err(BuildError::BadElf("kernel segment below image base"));
        }

        let segment_end = physaddr
            .checked_add(segment.p_memsz)
            .ok_or(BuildError::BadElf("kernel segment extent overflow"))?;
        limit = limit.max(segment_end);

        if payload.len() < (limit - image_base) as usize {
            payload.resize((limit - image_base) as usize, 0);
        }

        if segment.p_filesz > 0 {
            let bytes = elf.segment_bytes(&segment)?;
            let offset = (physaddr - image_base) as usize;
            payload[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
    }

    Ok(limit)
}

/// A relocatable executable staged at a fixed physical base.
#[derive(Debug)]
pub struct LoadedExecutable {
    pub base: u32,
    /// Absolute entry point: `e_entry + base`.
    pub entry: u32,
    /// File-backed image bytes, covering `[base, file_limit)`.
    pub data: Vec<u8>,
    /// End of file-backed data.
    pub file_limit: u32,
    /// End of the memory image including BSS; the allocation cursor must be
    /// advanced here by the caller.
    pub alloc_limit: u32,
}

/// Load an executable at `base`, placing segments by `p_paddr` relative to
/// the image start, then apply its relocation sections against `base`.
pub fn load_executable(path: &Path, base: u32) -> BuildResult<LoadedExecutable> {
    let elf = ElfFile::open(path)?;
    let entry = elf.entry().wrapping_add(base);

    let mut data = Vec::new();
    let mut file_limit = base;
    let mut alloc_limit = base;

    for segment in elf.program_headers()? {
        if !segment.is_load() {
            continue;
        }
        if segment.p_memsz < segment.p_filesz {
            return Err(BuildError::BadElf("LOAD segment has p_memsz < p_filesz"));
        }

        let physaddr = segment
            .p_paddr
            .checked_add(base)
            .ok_or(BuildError::BadElf("segment address overflow"))?;

        alloc_limit = alloc_limit.max(
            physaddr
                .checked_add(segment.p_memsz)
                .ok_or(BuildError::BadElf("segment extent overflow"))?,
        );
        file_limit = file_limit.max(physaddr + segment.p_filesz);

        if data.len() < (file_limit - base) as usize {
            data.resize((file_limit - base) as usize, 0);
        }

        if segment.p_filesz > 0 {
            let bytes = elf.segment_bytes(&segment)?;
            let offset = (physaddr - base) as usize;
            data[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
    }

    apply_relocations(&elf, &mut data, base)?;

    debug!(
        target: "loader",
        "executable {} at {:08X}, size {:08X}, entry {:08X}",
        path.display(),
        base,
        alloc_limit - base,
        entry
    );

    Ok(LoadedExecutable {
        base,
        entry,
        data,
        file_limit,
        alloc_limit,
    })
}
