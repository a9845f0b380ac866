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

//! The image layout engine.
//!
//! A build is a single forward pass over the blueprint. Modules, the DTB,
//! the environment block and the metadata table are placed against a
//! monotonically growing physical cursor starting at the image base; every
//! physical address recorded in metadata is translated to the kernel's
//! virtual address space through the kernel delta fixed when the kernel is
//! placed. After the uncompressed extent is final, deferred metadata values
//! are fixed up, the payload is LZ4-compressed, and the kickstart is staged
//! above the uncompressed image.

use std::path::Path;

use log::info;

use crate::blueprint::{parse_c_u32, Blueprint, Module, ModuleMetadata};
use crate::elf::{load_kernel_segments, write_boot_executable, ElfFile};
use crate::errors::{BuildError, BuildResult};
use crate::file::read_file;

use super::alloc::AllocationPointer;
use super::compress::compress_payload;
use super::kickstart::{self, KickstartInfo};
use super::metadata::{modinfo, modinfomd, FixupIntent, MetadataWriter};

/// Link-virtual base of ARM FreeBSD-style kernels (KERNBASE).
pub const KERNEL_VADDR: u32 = 0xC000_0000;

/// Kernel physical base alignment.
const KERNEL_ALIGN: u32 = 0x0010_0000;

const PAGE_SIZE: u32 = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModuleKind {
    ElfKernel,
    Binary,
}

fn module_kind(kind: &str) -> Option<ModuleKind> {
    match kind {
        "elf kernel" => Some(ModuleKind::ElfKernel),
        "md_image" => Some(ModuleKind::Binary),
        _ => None,
    }
}

/// A built boot image, ready to be written out.
///
/// All state is owned by one build invocation; [`Image::build`] starts from
/// a zeroed layout every time.
#[derive(Debug, Default)]
pub struct Image {
    image_base: u32,
    alloc: AllocationPointer,
    metadata: MetadataWriter,
    kernel_delta: u32,
    kernel_entry_point: u32,
    metadata_base: u32,
    metadata_end: u32,
    uncompressed_size: u32,
    image_displacement: u32,
    kickstart_base: u32,
    kickstart_entry: u32,
    payload: Vec<u8>,
    kickstart: Vec<u8>,
}

impl Image {
    pub fn build(blueprint: &Blueprint) -> BuildResult<Image> {
        let mut image = Image {
            image_base: blueprint.image_base,
            alloc: AllocationPointer::new(blueprint.image_base),
            ..Image::default()
        };

        info!(target: "layout", "Image base address: {:08X}", image.image_base);

        for module in &blueprint.modules {
            image.place_module(module)?;
        }

        image.finalize_metadata();
        image.compress()?;
        image.stage_kickstart(blueprint)?;

        Ok(image)
    }

    fn place_module(&mut self, module: &Module) -> BuildResult<()> {
        self.write_string_record(modinfo::MODINFO_NAME, &module.name);
        self.write_string_record(modinfo::MODINFO_TYPE, &module.kind);

        let kind = module_kind(&module.kind)
            .ok_or_else(|| BuildError::UnknownModuleType(module.kind.clone()))?;

        if kind == ModuleKind::ElfKernel {
            self.alloc.align_to(KERNEL_ALIGN);
            self.kernel_delta = self.alloc.current().wrapping_sub(KERNEL_VADDR);
            info!(
                target: "layout",
                "Kernel physical base: {:08X}, virtual base: {:08X}, delta: {:08X}",
                self.alloc.current(),
                KERNEL_VADDR,
                self.kernel_delta
            );
        }

        let base = self.alloc.current();
        let size = match kind {
            ModuleKind::ElfKernel => {
                let elf = ElfFile::open(&module.path)?;
                self.kernel_entry_point = elf.entry();
                let limit = load_kernel_segments(
                    &elf,
                    self.kernel_delta,
                    self.image_base,
                    &mut self.payload,
                    base,
                )?;
                limit - base
            }
            ModuleKind::Binary => {
                let data = read_file(&module.path)?;
                let size = u32::try_from(data.len())
                    .map_err(|_| BuildError::BadElf("module file exceeds 32-bit address space"))?;
                self.place_bytes(base, &data);
                size
            }
        };

        self.alloc.advance(size);
        self.alloc.align_to(PAGE_SIZE);

        self.metadata
            .write_record32(modinfo::MODINFO_ADDR, base.wrapping_sub(self.kernel_delta));
        self.metadata.write_record32(modinfo::MODINFO_SIZE, size);

        info!(
            target: "layout",
            "{} module {} (from {}): starts at {:08X}, length {:08X}",
            module.kind,
            module.name,
            module.path.display(),
            base,
            size
        );

        for entry in &module.metadata {
            self.place_metadata_entry(entry)?;
        }

        Ok(())
    }

    fn place_metadata_entry(&mut self, entry: &ModuleMetadata) -> BuildResult<()> {
        match entry {
            ModuleMetadata::Dtb(path) => {
                let data = read_file(path)?;
                let dtb_base = self.alloc.current();

                info!(
                    target: "layout",
                    "  DTB data: at {:08X} (virt {:08X}), size {:08X}",
                    dtb_base,
                    dtb_base.wrapping_sub(self.kernel_delta),
                    data.len()
                );

                self.place_bytes(dtb_base, &data);
                self.alloc.advance(data.len() as u32);
                self.alloc.align_to(PAGE_SIZE);

                self.metadata.write_record32(
                    modinfo::MODINFO_METADATA | modinfomd::MODINFOMD_DTBP,
                    dtb_base.wrapping_sub(self.kernel_delta),
                );
            }

            ModuleMetadata::Kernend => {
                self.metadata.write_deferred32(
                    modinfo::MODINFO_METADATA | modinfomd::MODINFOMD_KERNEND,
                    FixupIntent::Kernend,
                );
            }

            ModuleMetadata::Environment(pairs) => {
                let block = environment_block(pairs);
                let env_base = self.alloc.current();

                info!(
                    target: "layout",
                    "  Environment: at {:08X} (virt {:08X}), size {:08X}",
                    env_base,
                    env_base.wrapping_sub(self.kernel_delta),
                    block.len()
                );

                self.place_bytes(env_base, &block);
                self.alloc.advance(block.len() as u32);
                self.alloc.align_to(PAGE_SIZE);

                self.metadata.write_record32(
                    modinfo::MODINFO_METADATA | modinfomd::MODINFOMD_ENVP,
                    env_base.wrapping_sub(self.kernel_delta),
                );
            }

            ModuleMetadata::Howto(text) => {
                let howto = parse_c_u32(text).ok_or_else(|| {
                    BuildError::BlueprintParse(format!("invalid HOWTO value '{}'", text))
                })?;
                self.metadata
                    .write_record32(modinfo::MODINFO_METADATA | modinfomd::MODINFOMD_HOWTO, howto);
            }
        }

        Ok(())
    }

    /// Grow the payload to cover `[base, base + data.len())` and copy
    /// `data` there. The caller advances the cursor.
    fn place_bytes(&mut self, base: u32, data: &[u8]) {
        let offset = (base - self.image_base) as usize;
        let end = offset + data.len();
        if self.payload.len() < end {
            self.payload.resize(end, 0);
        }
        self.payload[offset..end].copy_from_slice(data);
    }

    fn write_string_record(&mut self, rtype: u32, value: &str) {
        // Payload strings carry their terminating NUL.
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        self.metadata.write_record(rtype, &bytes);
    }

    /// Terminate and place the metadata block, then resolve deferred
    /// values. The metadata end is captured before the trailing page bump:
    /// KERNEND preserves the kernel, modules, environment and metadata, but
    /// not the kickstart above them.
    fn finalize_metadata(&mut self) {
        self.metadata.write_record(modinfo::MODINFO_END, &[]);

        self.metadata_base = self.alloc.current();
        let bytes = self.metadata.to_bytes();

        info!(
            target: "layout",
            "Metadata: at {:08X}, size {:08X}",
            self.metadata_base,
            bytes.len()
        );

        self.place_bytes(self.metadata_base, &bytes);
        self.alloc.advance(bytes.len() as u32);
        self.metadata_end = self.alloc.current();

        self.alloc.align_to(PAGE_SIZE);
        self.uncompressed_size = self.alloc.current() - self.image_base;
        self.payload.resize(self.uncompressed_size as usize, 0);

        info!(target: "layout", "End of uncompressed image: {:08X}", self.alloc.current());

        let metadata_offset = (self.metadata_base - self.image_base) as usize;
        for fixup in self.metadata.fixups() {
            let value = match fixup.intent {
                FixupIntent::Kernend => {
                    let value = self.metadata_end.wrapping_sub(self.kernel_delta);
                    info!(target: "layout", "Fixing up KERNEND: {:08X}", value);
                    value
                }
            };
            let offset = metadata_offset + fixup.word_offset * 4;
            self.payload[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }
    }

    fn compress(&mut self) -> BuildResult<()> {
        let compressed = compress_payload(&self.payload)?;

        self.image_displacement = (self.payload.len() as u32)
            .checked_sub(compressed.len() as u32)
            .ok_or_else(|| {
                BuildError::Compressor("compressed payload larger than uncompressed".to_string())
            })?;

        info!(
            target: "layout",
            "Compressed image at {:08X}, {:08X} bytes ({}% of original)",
            self.image_base + self.image_displacement,
            compressed.len(),
            compressed.len() * 100 / self.payload.len().max(1)
        );

        self.payload = compressed;
        Ok(())
    }

    fn stage_kickstart(&mut self, blueprint: &Blueprint) -> BuildResult<()> {
        info!(target: "kickstart", "Kickstart executable: {}", blueprint.kickstart.display());

        let info = KickstartInfo {
            metadata_vaddr: self.metadata_base.wrapping_sub(self.kernel_delta),
            kernel_entry: self.kernel_entry_point.wrapping_add(self.kernel_delta),
            compressed_base: self.image_base + self.image_displacement,
            uncompressed_base: self.image_base,
        };

        let staged = kickstart::stage(
            &blueprint.kickstart,
            &blueprint.init_modules,
            info,
            &mut self.alloc,
        )?;

        self.kickstart_base = staged.base;
        self.kickstart_entry = staged.entry;
        self.kickstart = staged.data;
        Ok(())
    }

    pub fn write_elf(&self, path: &Path) -> BuildResult<()> {
        write_boot_executable(
            path,
            self.kickstart_entry,
            &self.payload,
            self.image_base + self.image_displacement,
            &self.kickstart,
            self.kickstart_base,
            self.alloc.current() - self.kickstart_base,
        )
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        crate::elf::build_boot_executable(
            self.kickstart_entry,
            &self.payload,
            self.image_base + self.image_displacement,
            &self.kickstart,
            self.kickstart_base,
            self.alloc.current() - self.kickstart_base,
        )
    }

    pub fn image_base(&self) -> u32 {
        self.image_base
    }

    pub fn kernel_delta(&self) -> u32 {
        self.kernel_delta
    }

    pub fn kernel_entry_point(&self) -> u32 {
        self.kernel_entry_point
    }

    pub fn metadata_base(&self) -> u32 {
        self.metadata_base
    }

    /// First byte past the metadata block (before the trailing page bump).
    pub fn metadata_end(&self) -> u32 {
        self.metadata_end
    }

    pub fn uncompressed_size(&self) -> u32 {
        self.uncompressed_size
    }

    pub fn image_displacement(&self) -> u32 {
        self.image_displacement
    }

    pub fn kickstart_base(&self) -> u32 {
        self.kickstart_base
    }

    pub fn kickstart_entry(&self) -> u32 {
        self.kickstart_entry
    }

    /// The compressed payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn kickstart(&self) -> &[u8] {
        &self.kickstart
    }

    /// Final cursor position, past the kickstart and init modules.
    pub fn allocation_end(&self) -> u32 {
        self.alloc.current()
    }
}

/// Serialize environment pairs as `key=value\0` entries with a trailing
/// extra NUL.
pub fn environment_block(pairs: &[(String, String)]) -> Vec<u8> {
    let mut block = Vec::new();
    for (key, value) in pairs {
        block.extend_from_slice(key.as_bytes());
        block.push(b'=');
        block.extend_from_slice(value.as_bytes());
        block.push(0);
    }
    block.push(0);
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_kind_table() {
        assert_eq!(module_kind("elf kernel"), Some(ModuleKind::ElfKernel));
        assert_eq!(module_kind("md_image"), Some(ModuleKind::Binary));
        assert_eq!(module_kind("zzz"), None);
        assert_eq!(module_kind("ELF KERNEL"), None);
    }

    #[test]
    fn test_environment_block_format() {
        let pairs = vec![
            ("foo".to_string(), "bar".to_string()),
            ("a".to_string(), "b".to_string()),
        ];
        assert_eq!(environment_block(&pairs), b"foo=bar\0a=b\0\0");
    }

    #[test]
    fn test_empty_environment_is_single_nul() {
        assert_eq!(environment_block(&[]), b"\0");
    }

    #[test]
    fn test_unknown_module_type_fails() {
        let blueprint = Blueprint {
            image_base: 0x8000_0000,
            modules: vec![Module {
                name: "k".to_string(),
                kind: "zzz".to_string(),
                path: "/nonexistent".into(),
                metadata: Vec::new(),
            }],
            ..Blueprint::new()
        };

        let err = Image::build(&blueprint).unwrap_err();
        match err {
            BuildError::UnknownModuleType(kind) => assert_eq!(kind, "zzz"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
