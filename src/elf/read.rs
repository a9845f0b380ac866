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

//! Validated read access to ELF32/ARM executables.

use std::path::Path;

use crate::errors::{BuildError, BuildResult};
use crate::file::read_file;

use super::constants::{EV_CURRENT, PHDR_SIZE, SHDR_SIZE};
use super::types::{Elf32Header, Elf32Phdr, Elf32Shdr};

/// A fully buffered ELF32/ARM `ET_EXEC` input file.
///
/// Construction validates the identification fields; header tables are
/// bounds-checked on access.
#[derive(Debug)]
pub struct ElfFile {
    data: Vec<u8>,
    header: Elf32Header,
}

impl ElfFile {
    pub fn open(path: &Path) -> BuildResult<Self> {
        Self::from_bytes(read_file(path)?)
    }

    pub fn from_bytes(data: Vec<u8>) -> BuildResult<Self> {
        let header = Elf32Header::parse(&data)
            .ok_or(BuildError::BadElf("file too small for ELF header"))?;

        if !header.has_valid_ident() {
            return Err(BuildError::BadElf(
                "not a 32-bit little-endian ELF (bad identification)",
            ));
        }
        if !header.is_executable() {
            return Err(BuildError::BadElf("not an ET_EXEC executable"));
        }
        if !header.is_arm() {
            return Err(BuildError::BadElf("machine type is not ARM"));
        }
        if header.e_version != EV_CURRENT as u32 {
            return Err(BuildError::BadElf("ELF version is not EV_CURRENT"));
        }
        if header.e_phentsize as usize != PHDR_SIZE {
            return Err(BuildError::BadElf(
                "e_phentsize does not match sizeof(Elf32_Phdr)",
            ));
        }

        Ok(ElfFile { data, header })
    }

    pub fn header(&self) -> &Elf32Header {
        &self.header
    }

    pub fn entry(&self) -> u32 {
        self.header.e_entry
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn program_headers(&self) -> BuildResult<Vec<Elf32Phdr>> {
        let start = self.header.e_phoff as usize;
        let count = self.header.e_phnum as usize;

        let end = count
            .checked_mul(PHDR_SIZE)
            .and_then(|bytes| start.checked_add(bytes))
            .ok_or(BuildError::BadElf("program header table size overflow"))?;
        if end > self.data.len() {
            return Err(BuildError::BadElf(
                "program header table extends beyond end of file",
            ));
        }

        let mut phdrs = Vec::with_capacity(count);
        for index in 0..count {
            // Bounds verified above; parse cannot fail.
            let phdr = Elf32Phdr::parse(&self.data, start + index * PHDR_SIZE)
                .ok_or(BuildError::BadElf("truncated program header"))?;
            phdrs.push(phdr);
        }
        Ok(phdrs)
    }

    /// Section headers, or an empty list when the file carries none
    /// (`e_shoff == 0`).
    pub fn section_headers(&self) -> BuildResult<Vec<Elf32Shdr>> {
        if self.header.e_shoff == 0 || self.header.e_shnum == 0 {
            return Ok(Vec::new());
        }

        let start = self.header.e_shoff as usize;
        let count = self.header.e_shnum as usize;

        let end = count
            .checked_mul(SHDR_SIZE)
            .and_then(|bytes| start.checked_add(bytes))
            .ok_or(BuildError::BadElf("section header table size overflow"))?;
        if end > self.data.len() {
            return Err(BuildError::BadElf(
                "section header table extends beyond end of file",
            ));
        }

        let mut shdrs = Vec::with_capacity(count);
        for index in 0..count {
            let shdr = Elf32Shdr::parse(&self.data, start + index * SHDR_SIZE)
                .ok_or(BuildError::BadElf("truncated section header"))?;
            shdrs.push(shdr);
        }
        Ok(shdrs)
    }

    /// File bytes of a segment: `[p_offset, p_offset + p_filesz)`.
    pub fn segment_bytes(&self, phdr: &Elf32Phdr) -> BuildResult<&[u8]> {
        let start = phdr.p_offset as usize;
        let end = start
            .checked_add(phdr.p_filesz as usize)
            .ok_or(BuildError::BadElf("segment file range overflow"))?;
        if end > self.data.len() {
            return Err(BuildError::BadElf(
                "segment file data extends beyond end of file",
            ));
        }
        Ok(&self.data[start..end])
    }

    /// File bytes of a section: `[sh_offset, sh_offset + sh_size)`.
    pub fn section_bytes(&self, shdr: &Elf32Shdr) -> BuildResult<&[u8]> {
        let start = shdr.sh_offset as usize;
        let end = start
            .checked_add(shdr.sh_size as usize)
            .ok_or(BuildError::BadElf("section file range overflow"))?;
        if end > self.data.len() {
            return Err(BuildError::BadElf(
                "section data extends beyond end of file",
            ));
        }
        Ok(&self.data[start..end])
    }
}
