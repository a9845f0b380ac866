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

pub mod alloc;
pub mod compress;
pub mod kickstart;
pub mod layout;
pub mod metadata;

pub use alloc::AllocationPointer;

pub use compress::compress_payload;

pub use kickstart::{KickstartInfo, StagedKickstart, INFO_HEADER_SIZE};

pub use layout::{environment_block, Image, KERNEL_VADDR};

pub use metadata::{
    decode_records, modinfo, modinfomd, FixupIntent, MetadataFixup, MetadataRecord, MetadataWriter,
};
