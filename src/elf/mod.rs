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

pub mod constants;
pub mod emit;
pub mod load;
pub mod read;
pub mod reloc;
pub mod types;

pub use constants::{
    elf_class, elf_data, elf_machine, elf_type, ph_flags, ph_type, reloc_type, sh_type,
    EHDR_SIZE, ELF_IDENT, ELF_MAGIC, PHDR_SIZE, RELA_SIZE, REL_SIZE, SHDR_SIZE,
};

pub use emit::{build_boot_executable, write_boot_executable};

pub use load::{load_executable, load_kernel_segments, LoadedExecutable};

pub use read::ElfFile;

pub use reloc::apply_relocations;

pub use types::{Elf32Header, Elf32Phdr, Elf32Rel, Elf32Rela, Elf32Shdr};
