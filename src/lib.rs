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

//! Boot image builder for ARM FreeBSD-style kernels.
//!
//! A textual blueprint names the kernel, loadable modules, a device tree
//! blob, a kernel environment and a kickstart stub. The builder lays
//! everything out against a physical allocation cursor, emits a FreeBSD
//! loader metadata table, LZ4-compresses the payload, relocates the
//! kickstart, and packages the result as a two-segment ELF32/ARM
//! executable that unpacks itself at boot.

pub mod blueprint;
pub mod elf;
pub mod errors;
pub mod file;
pub mod image;
pub mod logging;

pub use blueprint::{Blueprint, Module, ModuleMetadata};

pub use errors::{BuildError, BuildResult};

pub use image::Image;
