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

//! ELF32 on-disk structures.
//!
//! Every field is decoded and encoded explicitly as little-endian bytes, so
//! the tool produces identical images regardless of host endianness.

use super::constants::{
    elf_machine, elf_type, ph_type, ELF_IDENT, EHDR_SIZE, PHDR_SIZE, REL_SIZE, RELA_SIZE,
    SHDR_SIZE,
};

fn u16_at(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[derive(Debug, Clone, Copy)]
pub struct Elf32Header {
    pub e_ident: [u8; 16],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u32,
    pub e_phoff: u32,
    pub e_shoff: u32,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl Elf32Header {
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < EHDR_SIZE {
            return None;
        }

        let mut e_ident = [0u8; 16];
        e_ident.copy_from_slice(&data[0..16]);

        Some(Elf32Header {
            e_ident,
            e_type: u16_at(data, 16),
            e_machine: u16_at(data, 18),
            e_version: u32_at(data, 20),
            e_entry: u32_at(data, 24),
            e_phoff: u32_at(data, 28),
            e_shoff: u32_at(data, 32),
            e_flags: u32_at(data, 36),
            e_ehsize: u16_at(data, 40),
            e_phentsize: u16_at(data, 42),
            e_phnum: u16_at(data, 44),
            e_shentsize: u16_at(data, 46),
            e_shnum: u16_at(data, 48),
            e_shstrndx: u16_at(data, 50),
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.e_ident);
        out.extend_from_slice(&self.e_type.to_le_bytes());
        out.extend_from_slice(&self.e_machine.to_le_bytes());
        out.extend_from_slice(&self.e_version.to_le_bytes());
        out.extend_from_slice(&self.e_entry.to_le_bytes());
        out.extend_from_slice(&self.e_phoff.to_le_bytes());
        out.extend_from_slice(&self.e_shoff.to_le_bytes());
        out.extend_from_slice(&self.e_flags.to_le_bytes());
        out.extend_from_slice(&self.e_ehsize.to_le_bytes());
        out.extend_from_slice(&self.e_phentsize.to_le_bytes());
        out.extend_from_slice(&self.e_phnum.to_le_bytes());
        out.extend_from_slice(&self.e_shentsize.to_le_bytes());
        out.extend_from_slice(&self.e_shnum.to_le_bytes());
        out.extend_from_slice(&self.e_shstrndx.to_le_bytes());
    }

    /// True when `e_ident` begins with the expected magic/class/data/version
    /// prefix for a 32-bit little-endian image.
    pub fn has_valid_ident(&self) -> bool {
        self.e_ident[..ELF_IDENT.len()] == ELF_IDENT
    }

    pub fn is_executable(&self) -> bool {
        self.e_type == elf_type::ET_EXEC
    }

    pub fn is_arm(&self) -> bool {
        self.e_machine == elf_machine::EM_ARM
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Elf32Phdr {
    pub p_type: u32,
    pub p_offset: u32,
    pub p_vaddr: u32,
    pub p_paddr: u32,
    pub p_filesz: u32,
    pub p_memsz: u32,
    pub p_flags: u32,
    pub p_align: u32,
}

impl Elf32Phdr {
    pub fn parse(data: &[u8], offset: usize) -> Option<Self> {
        if data.len() < offset + PHDR_SIZE {
            return None;
        }

        Some(Elf32Phdr {
            p_type: u32_at(data, offset),
            p_offset: u32_at(data, offset + 4),
            p_vaddr: u32_at(data, offset + 8),
            p_paddr: u32_at(data, offset + 12),
            p_filesz: u32_at(data, offset + 16),
            p_memsz: u32_at(data, offset + 20),
            p_flags: u32_at(data, offset + 24),
            p_align: u32_at(data, offset + 28),
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.p_type.to_le_bytes());
        out.extend_from_slice(&self.p_offset.to_le_bytes());
        out.extend_from_slice(&self.p_vaddr.to_le_bytes());
        out.extend_from_slice(&self.p_paddr.to_le_bytes());
        out.extend_from_slice(&self.p_filesz.to_le_bytes());
        out.extend_from_slice(&self.p_memsz.to_le_bytes());
        out.extend_from_slice(&self.p_flags.to_le_bytes());
        out.extend_from_slice(&self.p_align.to_le_bytes());
    }

    pub fn is_load(&self) -> bool {
        self.p_type == ph_type::PT_LOAD
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Elf32Shdr {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u32,
    pub sh_addr: u32,
    pub sh_offset: u32,
    pub sh_size: u32,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u32,
    pub sh_entsize: u32,
}

impl Elf32Shdr {
    pub fn parse(data: &[u8], offset: usize) -> Option<Self> {
        if data.len() < offset + SHDR_SIZE {
            return None;
        }

        Some(Elf32Shdr {
            sh_name: u32_at(data, offset),
            sh_type: u32_at(data, offset + 4),
            sh_flags: u32_at(data, offset + 8),
            sh_addr: u32_at(data, offset + 12),
            sh_offset: u32_at(data, offset + 16),
            sh_size: u32_at(data, offset + 20),
            sh_link: u32_at(data, offset + 24),
            sh_info: u32_at(data, offset + 28),
            sh_addralign: u32_at(data, offset + 32),
            sh_entsize: u32_at(data, offset + 36),
        })
    }
}

/// `Elf32_Rel` relocation record. `r_info` packs the symbol index in the
/// upper 24 bits and the relocation type in the lower 8.
#[derive(Debug, Clone, Copy)]
pub struct Elf32Rel {
    pub r_offset: u32,
    pub r_info: u32,
}

impl Elf32Rel {
    pub fn parse(data: &[u8], offset: usize) -> Option<Self> {
        if data.len() < offset + REL_SIZE {
            return None;
        }

        Some(Elf32Rel {
            r_offset: u32_at(data, offset),
            r_info: u32_at(data, offset + 4),
        })
    }

    #[inline]
    pub fn reloc_type(&self) -> u32 {
        self.r_info & 0xFF
    }

    #[inline]
    pub fn symbol_index(&self) -> u32 {
        self.r_info >> 8
    }
}

/// `Elf32_Rela`. The explicit addend is tolerated but never consumed: the
/// only relocation this tool rewrites (`R_ARM_ABS32`) operates on the value
/// already stored in the image.
#[derive(Debug, Clone, Copy)]
pub struct Elf32Rela {
    pub r_offset: u32,
    pub r_info: u32,
    pub r_addend: i32,
}

impl Elf32Rela {
    pub fn parse(data: &[u8], offset: usize) -> Option<Self> {
        if data.len() < offset + RELA_SIZE {
            return None;
        }

        Some(Elf32Rela {
            r_offset: u32_at(data, offset),
            r_info: u32_at(data, offset + 4),
            r_addend: u32_at(data, offset + 8) as i32,
        })
    }

    #[inline]
    pub fn reloc_type(&self) -> u32 {
        self.r_info & 0xFF
    }
}
