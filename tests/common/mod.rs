//! Shared test fixtures: synthetic ELF32/ARM executables.

#![allow(dead_code)]

use std::path::Path;

use nonos_mkimage::elf::{
    elf_class, elf_data, elf_machine, elf_type, ph_type, sh_type, Elf32Header, Elf32Phdr,
    EHDR_SIZE, ELF_MAGIC, PHDR_SIZE, RELA_SIZE, REL_SIZE, SHDR_SIZE,
};

pub const EV_CURRENT: u8 = 1;

/// One `PT_LOAD` segment of a fixture executable.
pub struct Segment {
    pub vaddr: u32,
    pub paddr: u32,
    pub data: Vec<u8>,
    /// Memory size; equals the data length unless a BSS tail is wanted.
    pub memsz: u32,
}

struct RelSection {
    entries: Vec<(u32, u32)>,
    rela: bool,
}

/// Builds ELF32/ARM `ET_EXEC` images byte by byte.
pub struct ElfBuilder {
    entry: u32,
    segments: Vec<Segment>,
    rel_sections: Vec<RelSection>,
}

impl ElfBuilder {
    pub fn new(entry: u32) -> Self {
        ElfBuilder {
            entry,
            segments: Vec::new(),
            rel_sections: Vec::new(),
        }
    }

    pub fn segment(mut self, vaddr: u32, paddr: u32, data: Vec<u8>) -> Self {
        let memsz = data.len() as u32;
        self.segments.push(Segment {
            vaddr,
            paddr,
            data,
            memsz,
        });
        self
    }

    pub fn segment_with_bss(mut self, vaddr: u32, paddr: u32, data: Vec<u8>, memsz: u32) -> Self {
        self.segments.push(Segment {
            vaddr,
            paddr,
            data,
            memsz,
        });
        self
    }

    /// Add a `SHT_REL` section with `(r_offset, r_info)` entries.
    pub fn rel_section(mut self, entries: Vec<(u32, u32)>) -> Self {
        self.rel_sections.push(RelSection {
            entries,
            rela: false,
        });
        self
    }

    /// Add a `SHT_RELA` section; addends are written as zero.
    pub fn rela_section(mut self, entries: Vec<(u32, u32)>) -> Self {
        self.rel_sections.push(RelSection {
            entries,
            rela: true,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let phnum = self.segments.len();
        let shnum = if self.rel_sections.is_empty() {
            0
        } else {
            self.rel_sections.len() + 1 // leading SHT_NULL entry
        };

        let phoff = EHDR_SIZE;
        let shoff = phoff + phnum * PHDR_SIZE;
        let mut data_offset = shoff + shnum * SHDR_SIZE;

        let mut segment_offsets = Vec::with_capacity(phnum);
        for segment in &self.segments {
            segment_offsets.push(data_offset);
            data_offset += segment.data.len();
        }

        let mut section_offsets = Vec::with_capacity(self.rel_sections.len());
        for section in &self.rel_sections {
            let entsize = if section.rela { RELA_SIZE } else { REL_SIZE };
            section_offsets.push(data_offset);
            data_offset += section.entries.len() * entsize;
        }

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
            e_version: 1,
            e_entry: self.entry,
            e_phoff: phoff as u32,
            e_shoff: if shnum > 0 { shoff as u32 } else { 0 },
            e_flags: 0,
            e_ehsize: EHDR_SIZE as u16,
            e_phentsize: PHDR_SIZE as u16,
            e_phnum: phnum as u16,
            e_shentsize: if shnum > 0 { SHDR_SIZE as u16 } else { 0 },
            e_shnum: shnum as u16,
            e_shstrndx: 0,
        };

        let mut out = Vec::new();
        header.write(&mut out);

        for (segment, &offset) in self.segments.iter().zip(&segment_offsets) {
            Elf32Phdr {
                p_type: ph_type::PT_LOAD,
                p_offset: offset as u32,
                p_vaddr: segment.vaddr,
                p_paddr: segment.paddr,
                p_filesz: segment.data.len() as u32,
                p_memsz: segment.memsz,
                p_flags: 7,
                p_align: 4,
            }
            .write(&mut out);
        }

        if shnum > 0 {
            write_shdr(&mut out, 0, 0, 0, 0); // SHT_NULL
            for (section, &offset) in self.rel_sections.iter().zip(&section_offsets) {
                let (stype, entsize) = if section.rela {
                    (sh_type::SHT_RELA, RELA_SIZE)
                } else {
                    (sh_type::SHT_REL, REL_SIZE)
                };
                write_shdr(
                    &mut out,
                    stype,
                    offset as u32,
                    (section.entries.len() * entsize) as u32,
                    entsize as u32,
                );
            }
        }

        for segment in &self.segments {
            out.extend_from_slice(&segment.data);
        }

        for section in &self.rel_sections {
            for &(r_offset, r_info) in &section.entries {
                out.extend_from_slice(&r_offset.to_le_bytes());
                out.extend_from_slice(&r_info.to_le_bytes());
                if section.rela {
                    out.extend_from_slice(&0u32.to_le_bytes());
                }
            }
        }

        out
    }

    pub fn write(&self, path: &Path) {
        std::fs::write(path, self.build()).expect("write fixture ELF");
    }
}

fn write_shdr(out: &mut Vec<u8>, sh_type: u32, sh_offset: u32, sh_size: u32, sh_entsize: u32) {
    out.extend_from_slice(&0u32.to_le_bytes()); // sh_name
    out.extend_from_slice(&sh_type.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // sh_flags
    out.extend_from_slice(&0u32.to_le_bytes()); // sh_addr
    out.extend_from_slice(&sh_offset.to_le_bytes());
    out.extend_from_slice(&sh_size.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // sh_link
    out.extend_from_slice(&0u32.to_le_bytes()); // sh_info
    out.extend_from_slice(&4u32.to_le_bytes()); // sh_addralign
    out.extend_from_slice(&sh_entsize.to_le_bytes());
}

/// Decompress an LZ4 frame back into the raw payload.
pub fn lz4_decompress(data: &[u8]) -> Vec<u8> {
    use std::io::Read;
    let mut decoder = lz4::Decoder::new(data).expect("LZ4 frame header");
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).expect("LZ4 frame body");
    out
}

/// `(r_offset, r_info)` for an `R_ARM_ABS32` record.
pub fn abs32(offset: u32) -> (u32, u32) {
    (offset, nonos_mkimage::elf::reloc_type::R_ARM_ABS32)
}
