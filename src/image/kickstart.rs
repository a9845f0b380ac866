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

//! Kickstart staging.
//!
//! The kickstart is a small position-independent stub that decompresses the
//! payload at boot and jumps into the kernel. Its first 20 bytes are a
//! reserved header the stager fills with five words:
//!
//! | word | value |
//! |---|---|
//! | 0 | virtual address of the metadata table |
//! | 1 | physical kernel entry point |
//! | 2 | load address of the compressed payload |
//! | 3 | target address of the uncompressed payload |
//! | 4 | init-module entry table address, or 0 |

use std::path::{Path, PathBuf};

use log::info;

use crate::elf::load_executable;
use crate::errors::{BuildError, BuildResult};

use super::alloc::AllocationPointer;

pub const INFO_HEADER_SIZE: usize = 20;

/// Addresses the kickstart needs at runtime.
#[derive(Debug, Clone, Copy)]
pub struct KickstartInfo {
    pub metadata_vaddr: u32,
    pub kernel_entry: u32,
    pub compressed_base: u32,
    pub uncompressed_base: u32,
}

#[derive(Debug)]
pub struct StagedKickstart {
    pub base: u32,
    pub entry: u32,
    pub data: Vec<u8>,
}

fn store_word(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Load and relocate the kickstart at the current cursor, fill its info
/// header, and append the init-module table and images when present.
///
/// The cursor ends past everything staged here; the gap between the
/// returned data length and the cursor is the kickstart's BSS.
pub fn stage(
    kickstart_path: &Path,
    init_modules: &[PathBuf],
    info: KickstartInfo,
    alloc: &mut AllocationPointer,
) -> BuildResult<StagedKickstart> {
    let base = alloc.current();
    let exe = load_executable(kickstart_path, base)?;

    if ((exe.alloc_limit - base) as usize) < INFO_HEADER_SIZE {
        return Err(BuildError::BadElf("kickstart image too small for info header"));
    }
    alloc.advance_to(exe.alloc_limit);

    info!(
        target: "kickstart",
        "kickstart at {:08X}, size {:08X}, entry {:08X}",
        base,
        exe.alloc_limit - base,
        exe.entry
    );

    let mut data = exe.data;
    if data.len() < INFO_HEADER_SIZE {
        data.resize(INFO_HEADER_SIZE, 0);
    }

    let module_table = if init_modules.is_empty() {
        0
    } else {
        alloc.align_to(4);
        let table = alloc.current();
        let table_bytes = (init_modules.len() + 1) * 4;

        data.resize((table - base) as usize + table_bytes, 0);
        alloc.advance(table_bytes as u32);

        for (index, module_path) in init_modules.iter().enumerate() {
            alloc.align_to(8);
            let module_base = alloc.current();
            let module = load_executable(module_path, module_base)?;
            alloc.advance_to(module.alloc_limit);
            let module_limit = alloc.current();

            info!(
                target: "kickstart",
                "module {} at {:08X}, limit {:08X}, entry {:08X}",
                module_path.display(),
                module_base,
                module_limit,
                module.entry
            );

            data.resize((module_limit - base) as usize, 0);
            let offset = (module_base - base) as usize;
            data[offset..offset + module.data.len()].copy_from_slice(&module.data);

            store_word(&mut data, (table - base) as usize + index * 4, module.entry);
        }

        // Null terminator in the final slot.
        store_word(
            &mut data,
            (table - base) as usize + init_modules.len() * 4,
            0,
        );

        table
    };

    store_word(&mut data, 0, info.metadata_vaddr);
    store_word(&mut data, 4, info.kernel_entry);
    store_word(&mut data, 8, info.compressed_base);
    store_word(&mut data, 12, info.uncompressed_base);
    store_word(&mut data, 16, module_table);

    Ok(StagedKickstart {
        base,
        entry: exe.entry,
        data,
    })
}
