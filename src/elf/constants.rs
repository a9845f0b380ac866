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

pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Expected `e_ident` prefix for every input and output image:
/// magic, ELFCLASS32, ELFDATA2LSB, EV_CURRENT.
pub const ELF_IDENT: [u8; 7] = [
    0x7f,
    b'E',
    b'L',
    b'F',
    elf_class::ELFCLASS32,
    elf_data::ELFDATA2LSB,
    EV_CURRENT,
];

pub const EV_CURRENT: u8 = 1;

/// On-disk record sizes for the ELF32 structures this tool reads and writes.
pub const EHDR_SIZE: usize = 52;
pub const PHDR_SIZE: usize = 32;
pub const SHDR_SIZE: usize = 40;
pub const REL_SIZE: usize = 8;
pub const RELA_SIZE: usize = 12;

pub mod elf_class {
    pub const ELFCLASS32: u8 = 1;
    pub const ELFCLASS64: u8 = 2;
}

pub mod elf_data {
    pub const ELFDATA2LSB: u8 = 1;
    pub const ELFDATA2MSB: u8 = 2;
}

pub mod elf_type {
    pub const ET_NONE: u16 = 0;
    pub const ET_REL: u16 = 1;
    pub const ET_EXEC: u16 = 2;
    pub const ET_DYN: u16 = 3;
}

pub mod elf_machine {
    pub const EM_NONE: u16 = 0;
    pub const EM_ARM: u16 = 40;
    pub const EM_X86_64: u16 = 62;
    pub const EM_AARCH64: u16 = 183;
}

pub mod ph_type {
    pub const PT_NULL: u32 = 0;
    pub const PT_LOAD: u32 = 1;
    pub const PT_DYNAMIC: u32 = 2;
    pub const PT_INTERP: u32 = 3;
    pub const PT_NOTE: u32 = 4;
    pub const PT_PHDR: u32 = 6;
}

pub mod ph_flags {
    pub const PF_X: u32 = 1;
    pub const PF_W: u32 = 2;
    pub const PF_R: u32 = 4;
}

pub mod sh_type {
    pub const SHT_NULL: u32 = 0;
    pub const SHT_PROGBITS: u32 = 1;
    pub const SHT_SYMTAB: u32 = 2;
    pub const SHT_STRTAB: u32 = 3;
    pub const SHT_RELA: u32 = 4;
    pub const SHT_NOBITS: u32 = 8;
    pub const SHT_REL: u32 = 9;
}

/// ARM relocation types the kickstart loader understands.
pub mod reloc_type {
    pub const R_ARM_NONE: u32 = 0;
    pub const R_ARM_ABS32: u32 = 2;
    pub const R_ARM_REL32: u32 = 3;
    pub const R_ARM_CALL: u32 = 28;
    pub const R_ARM_PREL31: u32 = 42;
}
