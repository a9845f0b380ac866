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

//! Position adjustment of relocatable executables.
//!
//! The kickstart and init modules are linked at address zero and shifted
//! rigidly to their staging base, so only `R_ARM_ABS32` needs rewriting;
//! the PC-relative forms stay valid after the shift.

use log::debug;

use crate::errors::{BuildError, BuildResult};

use super::constants::{reloc_type, sh_type, REL_SIZE, RELA_SIZE};
use super::read::ElfFile;
use super::types::{Elf32Rel, Elf32Rela};

/// Apply every `SHT_REL`/`SHT_RELA` section of `elf` to `image`, which is
/// loaded at `base`. Returns the number of records processed.
pub fn apply_relocations(elf: &ElfFile, image: &mut [u8], base: u32) -> BuildResult<usize> {
    let mut applied = 0;

    for section in elf.section_headers()? {
        match section.sh_type {
            sh_type::SHT_REL => {
                if section.sh_entsize as usize != REL_SIZE
                    || section.sh_size as usize % REL_SIZE != 0
                {
                    return Err(BuildError::BadRelocationSection(
                        "SHT_REL entry size or section size mismatch",
                    ));
                }

                let data = elf.section_bytes(&section)?;
                let count = data.len() / REL_SIZE;
                for index in 0..count {
                    // Bounds verified by section_bytes; parse cannot fail.
                    let rel = Elf32Rel::parse(data, index * REL_SIZE)
                        .ok_or(BuildError::BadRelocationSection("truncated SHT_REL entry"))?;
                    apply_one(image, rel.r_offset, rel.reloc_type(), base)?;
                    applied += 1;
                }
            }

            sh_type::SHT_RELA => {
                if section.sh_entsize as usize != RELA_SIZE
                    || section.sh_size as usize % RELA_SIZE != 0
                {
                    return Err(BuildError::BadRelocationSection(
                        "SHT_RELA entry size or section size mismatch",
                    ));
                }

                let data = elf.section_bytes(&section)?;
                let count = data.len() / RELA_SIZE;
                for index in 0..count {
                    // Addends are tolerated but not consumed.
                    let rela = Elf32Rela::parse(data, index * RELA_SIZE).ok_or(
                        BuildError::BadRelocationSection("truncated SHT_RELA entry"),
                    )?;
                    apply_one(image, rela.r_offset, rela.reloc_type(), base)?;
                    applied += 1;
                }
            }

            _ => {}
        }
    }

    if applied > 0 {
        debug!(target: "reloc", "applied {} relocations at base {:08X}", applied, base);
    }

    Ok(applied)
}

fn apply_one(image: &mut [u8], offset: u32, rtype: u32, base: u32) -> BuildResult<()> {
    match rtype {
        reloc_type::R_ARM_ABS32 => {
            let offset = offset as usize;
            if offset + 4 > image.len() {
                return Err(BuildError::BadRelocationSection(
                    "relocation target outside image",
                ));
            }

            // Byte-wise read-modify-write: the target word may be unaligned.
            let mut word = [0u8; 4];
            word.copy_from_slice(&image[offset..offset + 4]);
            let value = u32::from_le_bytes(word).wrapping_add(base);
            image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
            Ok(())
        }

        // PC-relative; unchanged by a rigid base shift.
        reloc_type::R_ARM_REL32 | reloc_type::R_ARM_CALL | reloc_type::R_ARM_PREL31 => Ok(()),

        other => Err(BuildError::UnsupportedRelocation(other)),
    }
}
