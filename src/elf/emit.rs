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

//! Output executable writer.
//!
//! The boot image is an ELF32/ARM `ET_EXEC` with exactly two `PT_LOAD`
//! segments: the compressed payload and the relocated kickstart. The whole
//! file is assembled in memory and written in one step, so a failed build
//! never leaves a partial file on disk.

use std::path::Path;

use crate::errors::BuildResult;
use crate::file::write_file;

use super::constants::{
    elf_class, elf_data, elf_machine, elf_type, ph_flags, ph_type, EHDR_SIZE, EV_CURRENT,
    PHDR_SIZE, ELF_MAGIC,
};
use super::types::{Elf32Header, Elf32Phdr};

/// Segment data start and on-disk alignment.
const DATA_ALIGN: u32 = 0x1000;

const SEGMENT_FLAGS: u32 = ph_flags::PF_R | ph_flags::PF_W | ph_flags::PF_X;

fn align_up(value: u32, alignment: u32) -> u32 {
    (value + (alignment - 1)) & !(alignment - 1)
}

/// Serialize the two-segment boot executable.
///
/// `kickstart_memsz` exceeds `kickstart.len()` when init modules or BSS
/// extend the runtime footprint past the file-backed bytes.
pub fn build_boot_executable(
    entry: u32,
    payload: &[u8],
    payload_addr: u32,
    kickstart: &[u8],
    kickstart_base: u32,
    kickstart_memsz: u32,
) -> Vec<u8> {
    let payload_offset = DATA_ALIGN;
    let kickstart_offset = payload_offset + align_up(payload.len() as u32, DATA_ALIGN);

    let payload_phdr = Elf32Phdr {
        p_type: ph_type::PT_LOAD,
        p_offset: payload_offset,
        p_vaddr: payload_addr,
        p_paddr: payload_addr,
        p_filesz: payload.len() as u32,
        p_memsz: payload.len() as u32,
        p_flags: SEGMENT_FLAGS,
        p_align: DATA_ALIGN,
    };

    let kickstart_phdr = Elf32Phdr {
        p_type: ph_type::PT_LOAD,
        p_offset: kickstart_offset,
        p_vaddr: kickstart_base,
        p_paddr: kickstart_base,
        p_filesz: kickstart.len() as u32,
        p_memsz: kickstart_memsz,
        p_flags: SEGMENT_FLAGS,
        p_align: DATA_ALIGN,
    };

    let header = Elf32Header {
        e_ident: {
            let mut ident = [0u8; 16];
            ident[0..4].copy_from_slice(&ELF_MAGIC);
            ident[4] = elf_class::ELFCLASS32;
            ident[5] = elf_data::ELFDATA2LSB;
            ident[6] = EV_CURRENT;
            ident
        },
        e_type: elf_type::ET_EXEC,
        e_machine: elf_machine::EM_ARM,
        e_version: EV_CURRENT as u32,
        e_entry: entry,
        e_phoff: EHDR_SIZE as u32,
        e_shoff: 0,
        e_flags: 0,
        e_ehsize: EHDR_SIZE as u16,
        e_phentsize: PHDR_SIZE as u16,
        e_phnum: 2,
        e_shentsize: 0,
        e_shnum: 0,
        e_shstrndx: 0,
    };

    let mut out = Vec::with_capacity(kickstart_offset as usize + kickstart.len());
    header.write(&mut out);
    payload_phdr.write(&mut out);
    kickstart_phdr.write(&mut out);

    out.resize(payload_offset as usize, 0);
    out.extend_from_slice(payload);
    out.resize(kickstart_offset as usize, 0);
    out.extend_from_slice(kickstart);

    out
}

pub fn write_boot_executable(
    path: &Path,
    entry: u32,
    payload: &[u8],
    payload_addr: u32,
    kickstart: &[u8],
    kickstart_base: u32,
    kickstart_memsz: u32,
) -> BuildResult<()> {
    let bytes = build_boot_executable(
        entry,
        payload,
        payload_addr,
        kickstart,
        kickstart_base,
        kickstart_memsz,
    );
    write_file(path, &bytes)
}
