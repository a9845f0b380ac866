//! End-to-end image builds over synthetic blueprints and ELF fixtures.

mod common;

use std::path::PathBuf;

use tempfile::TempDir;

use common::{abs32, lz4_decompress, ElfBuilder};
use nonos_mkimage::blueprint::Blueprint;
use nonos_mkimage::elf::ElfFile;
use nonos_mkimage::errors::BuildError;
use nonos_mkimage::image::{decode_records, modinfo, modinfomd, Image, KERNEL_VADDR};

const IMAGE_BASE: u32 = 0x8000_0000;
const KERNEL_ENTRY_OFFSET: u32 = 0x40;

struct Fixture {
    #[allow(dead_code)]
    dir: TempDir,
    kernel: PathBuf,
    kickstart: PathBuf,
}

fn kernel_bytes() -> Vec<u8> {
    (0..0x100u32).map(|i| (i % 251) as u8).collect()
}

fn setup() -> Fixture {
    let dir = tempfile::tempdir().unwrap();

    let kernel = dir.path().join("kernel.elf");
    ElfBuilder::new(KERNEL_VADDR + KERNEL_ENTRY_OFFSET)
        .segment(KERNEL_VADDR, KERNEL_VADDR, kernel_bytes())
        .write(&kernel);

    // Kickstart linked at zero: 0x40 file bytes, an ABS32 site at 0x30
    // whose stored value is zero.
    let kickstart = dir.path().join("kickstart.elf");
    ElfBuilder::new(0x20)
        .segment(0, 0, vec![0u8; 0x40])
        .rel_section(vec![abs32(0x30)])
        .write(&kickstart);

    Fixture {
        dir,
        kernel,
        kickstart,
    }
}

fn blueprint_text(fixture: &Fixture, kernel_metadata: &str) -> String {
    format!(
        "IMAGE_BASE 0x80000000\nKICKSTART \"{}\"\nMODULE kernel \"elf kernel\" \"{}\"{}\n",
        fixture.kickstart.display(),
        fixture.kernel.display(),
        kernel_metadata,
    )
}

fn build(fixture: &Fixture, kernel_metadata: &str) -> Image {
    let blueprint = Blueprint::parse_str(&blueprint_text(fixture, kernel_metadata)).unwrap();
    Image::build(&blueprint).unwrap()
}

/// Decompress the payload and return it alongside the decoded metadata
/// records.
fn unpack(image: &Image) -> (Vec<u8>, Vec<nonos_mkimage::image::MetadataRecord>) {
    let payload = lz4_decompress(image.payload());
    assert_eq!(payload.len() as u32, image.uncompressed_size());

    let offset = (image.metadata_base() - image.image_base()) as usize;
    let records = decode_records(&payload[offset..]).expect("well-formed metadata stream");
    (payload, records)
}

fn record_u32(record: &nonos_mkimage::image::MetadataRecord) -> u32 {
    u32::from_le_bytes(record.data.as_slice().try_into().expect("u32 payload"))
}

#[test]
fn minimal_kernel_layout() {
    let fixture = setup();
    let image = build(&fixture, "");

    // Kernel physical base is the image base bumped to 1 MiB.
    assert_eq!(image.kernel_delta(), 0x8010_0000u32.wrapping_sub(KERNEL_VADDR));
    assert_eq!(image.kernel_entry_point(), KERNEL_VADDR + KERNEL_ENTRY_OFFSET);

    // Kernel body (0x100 bytes) rounds up to one page before the metadata.
    assert_eq!(image.metadata_base(), 0x8010_1000);

    let (payload, records) = unpack(&image);

    // Kernel bytes landed at 0x80100000.
    let kernel_offset = (0x8010_0000 - IMAGE_BASE) as usize;
    assert_eq!(&payload[kernel_offset..kernel_offset + 0x100], kernel_bytes().as_slice());

    // NAME, TYPE, ADDR, SIZE, END.
    assert_eq!(records.len(), 5);
    assert_eq!(records[0].rtype, modinfo::MODINFO_NAME);
    assert_eq!(records[0].data, b"kernel\0");
    assert_eq!(records[1].rtype, modinfo::MODINFO_TYPE);
    assert_eq!(records[1].data, b"elf kernel\0");
    assert_eq!(records[2].rtype, modinfo::MODINFO_ADDR);
    assert_eq!(record_u32(&records[2]), KERNEL_VADDR);
    assert_eq!(records[3].rtype, modinfo::MODINFO_SIZE);
    assert_eq!(record_u32(&records[3]), 0x100);
    assert_eq!(records[4].rtype, modinfo::MODINFO_END);
}

#[test]
fn kernend_record_value() {
    let fixture = setup();
    let image = build(&fixture, " METADATA\nKERNEND\nEND");

    let (_, records) = unpack(&image);
    let kernend = records
        .iter()
        .find(|r| r.rtype == modinfo::MODINFO_METADATA | modinfomd::MODINFOMD_KERNEND)
        .expect("KERNEND record");

    // First byte past the metadata block, before the trailing page bump.
    let expected = image.metadata_end().wrapping_sub(image.kernel_delta());
    assert_eq!(record_u32(kernend), expected);
    assert_eq!(
        image.metadata_end() - image.metadata_base(),
        ((records.len() * 2 + records.iter().map(|r| r.data.len().div_ceil(4)).sum::<usize>())
            * 4) as u32
    );
}

#[test]
fn environment_block_round_trip() {
    let fixture = setup();
    let image = build(
        &fixture,
        " METADATA\nENVIRONMENT\nSET foo bar\nSET a b\nEND\nEND",
    );

    let (payload, records) = unpack(&image);
    let envp = records
        .iter()
        .find(|r| r.rtype == modinfo::MODINFO_METADATA | modinfomd::MODINFOMD_ENVP)
        .expect("ENVP record");

    let env_base = record_u32(envp).wrapping_add(image.kernel_delta());
    assert_eq!(env_base % 0x1000, 0);

    let offset = (env_base - IMAGE_BASE) as usize;
    assert_eq!(&payload[offset..offset + 13], b"foo=bar\0a=b\0\0");
}

#[test]
fn dtb_placement() {
    let fixture = setup();
    let dtb_path = fixture.dir.path().join("board.dtb");
    let dtb_bytes: Vec<u8> = (0..0x23u32).map(|i| (i * 7) as u8).collect();
    std::fs::write(&dtb_path, &dtb_bytes).unwrap();

    let image = build(
        &fixture,
        &format!(" METADATA\nDTB \"{}\"\nEND", dtb_path.display()),
    );

    let (payload, records) = unpack(&image);
    let dtbp = records
        .iter()
        .find(|r| r.rtype == modinfo::MODINFO_METADATA | modinfomd::MODINFOMD_DTBP)
        .expect("DTBP record");

    let dtb_base = record_u32(dtbp).wrapping_add(image.kernel_delta());
    assert_eq!(dtb_base, 0x8010_1000); // first page after the kernel body
    let offset = (dtb_base - IMAGE_BASE) as usize;
    assert_eq!(&payload[offset..offset + dtb_bytes.len()], dtb_bytes.as_slice());

    // DTB pushed the metadata block out by one page.
    assert_eq!(image.metadata_base(), 0x8010_2000);
}

#[test]
fn howto_numeral_bases() {
    let fixture = setup();
    let image = build(&fixture, " METADATA\nHOWTO 0x10\nHOWTO 020\nHOWTO 10\nEND");

    let (_, records) = unpack(&image);
    let howtos: Vec<u32> = records
        .iter()
        .filter(|r| r.rtype == modinfo::MODINFO_METADATA | modinfomd::MODINFOMD_HOWTO)
        .map(record_u32)
        .collect();

    assert_eq!(howtos, vec![0x10, 0x10, 10]);
}

#[test]
fn unknown_module_type_aborts_build() {
    let fixture = setup();
    let text = format!(
        "IMAGE_BASE 0x80000000\nKICKSTART \"{}\"\nMODULE weird zzz \"{}\"\n",
        fixture.kickstart.display(),
        fixture.kernel.display(),
    );
    let blueprint = Blueprint::parse_str(&text).unwrap();

    match Image::build(&blueprint) {
        Err(BuildError::UnknownModuleType(kind)) => assert_eq!(kind, "zzz"),
        other => panic!("expected UnknownModuleType, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn kickstart_relocation_and_info_header() {
    let fixture = setup();
    let image = build(&fixture, "");

    let kickstart = image.kickstart();
    let word = |offset: usize| {
        u32::from_le_bytes(kickstart[offset..offset + 4].try_into().unwrap())
    };

    // The ABS32 site at 0x30 held zero, so it now holds the staging base.
    assert_eq!(word(0x30), image.kickstart_base());

    // Info header.
    assert_eq!(
        word(0),
        image.metadata_base().wrapping_sub(image.kernel_delta())
    );
    assert_eq!(
        word(4),
        image
            .kernel_entry_point()
            .wrapping_add(image.kernel_delta())
    );
    assert_eq!(word(8), IMAGE_BASE + image.image_displacement());
    assert_eq!(word(12), IMAGE_BASE);
    assert_eq!(word(16), 0);

    // Entry is the ELF entry shifted to the staging base.
    assert_eq!(image.kickstart_entry(), image.kickstart_base() + 0x20);
    // Kickstart sits on the first page boundary past the metadata.
    assert_eq!(image.kickstart_base() % 0x1000, 0);
    assert!(image.kickstart_base() >= image.metadata_end());
}

#[test]
fn output_elf_is_well_formed() {
    let fixture = setup();
    let image = build(&fixture, " METADATA\nKERNEND\nEND");

    let elf = ElfFile::from_bytes(image.to_bytes()).unwrap();
    assert_eq!(elf.entry(), image.kickstart_entry());

    let phdrs = elf.program_headers().unwrap();
    assert_eq!(phdrs.len(), 2);
    assert!(phdrs.iter().all(|p| p.is_load() && p.p_align == 0x1000));

    // Payload segment: compressed bytes at imageBase + displacement.
    assert_eq!(phdrs[0].p_vaddr, IMAGE_BASE + image.image_displacement());
    assert_eq!(phdrs[0].p_filesz as usize, image.payload().len());
    assert_eq!(phdrs[0].p_memsz, phdrs[0].p_filesz);
    assert_eq!(elf.segment_bytes(&phdrs[0]).unwrap(), image.payload());

    // Kickstart segment covers the staged bytes.
    assert_eq!(phdrs[1].p_vaddr, image.kickstart_base());
    assert_eq!(phdrs[1].p_filesz as usize, image.kickstart().len());
    assert_eq!(
        phdrs[1].p_memsz,
        image.allocation_end() - image.kickstart_base()
    );
    assert_eq!(elf.segment_bytes(&phdrs[1]).unwrap(), image.kickstart());
}

#[test]
fn write_elf_creates_output_file() {
    let fixture = setup();
    let image = build(&fixture, "");

    let out = fixture.dir.path().join("boot.elf");
    image.write_elf(&out).unwrap();

    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(bytes, image.to_bytes());
    ElfFile::from_bytes(bytes).unwrap();
}

#[test]
fn recorded_virtual_addresses_stay_inside_image() {
    let fixture = setup();
    let dtb_path = fixture.dir.path().join("board.dtb");
    std::fs::write(&dtb_path, vec![0x5Au8; 0x40]).unwrap();

    let image = build(
        &fixture,
        &format!(
            " METADATA\nDTB \"{}\"\nENVIRONMENT\nSET console uart0\nEND\nKERNEND\nEND",
            dtb_path.display()
        ),
    );
    let (_, records) = unpack(&image);

    let tracked = [
        modinfo::MODINFO_ADDR,
        modinfo::MODINFO_METADATA | modinfomd::MODINFOMD_DTBP,
        modinfo::MODINFO_METADATA | modinfomd::MODINFOMD_ENVP,
        modinfo::MODINFO_METADATA | modinfomd::MODINFOMD_KERNEND,
    ];

    let mut seen = 0;
    for record in records.iter().filter(|r| tracked.contains(&r.rtype)) {
        let physical = record_u32(record).wrapping_add(image.kernel_delta());
        assert!(physical >= IMAGE_BASE);
        assert!(physical < IMAGE_BASE + image.uncompressed_size());
        seen += 1;
    }
    assert_eq!(seen, 4);
}

#[test]
fn binary_module_after_kernel() {
    let fixture = setup();
    let blob_path = fixture.dir.path().join("rootfs.img");
    let blob: Vec<u8> = (0..0x180u32).map(|i| (i % 253) as u8).collect();
    std::fs::write(&blob_path, &blob).unwrap();

    let text = format!(
        concat!(
            "IMAGE_BASE 0x80000000\n",
            "KICKSTART \"{}\"\n",
            "MODULE kernel \"elf kernel\" \"{}\"\n",
            "MODULE rootfs md_image \"{}\"\n",
        ),
        fixture.kickstart.display(),
        fixture.kernel.display(),
        blob_path.display(),
    );
    let image = Image::build(&Blueprint::parse_str(&text).unwrap()).unwrap();

    let (payload, records) = unpack(&image);

    // Second module's NAME/TYPE/ADDR/SIZE follow the kernel's records.
    assert_eq!(records[4].rtype, modinfo::MODINFO_NAME);
    assert_eq!(records[4].data, b"rootfs\0");
    assert_eq!(records[5].data, b"md_image\0");

    let addr = record_u32(&records[6]);
    let size = record_u32(&records[7]);
    assert_eq!(size as usize, blob.len());

    // Placed on the page after the kernel body, recorded as virtual.
    let physical = addr.wrapping_add(image.kernel_delta());
    assert_eq!(physical, 0x8010_1000);

    let offset = (physical - IMAGE_BASE) as usize;
    assert_eq!(&payload[offset..offset + blob.len()], blob.as_slice());
}

#[test]
fn init_modules_are_staged_with_entry_table() {
    let fixture = setup();

    let make_module = |name: &str, entry: u32, fill: u8| -> PathBuf {
        let path = fixture.dir.path().join(name);
        ElfBuilder::new(entry)
            .segment(0, 0, vec![fill; 0x28])
            .write(&path);
        path
    };
    let first = make_module("init0.elf", 0x8, 0x11);
    let second = make_module("init1.elf", 0xC, 0x22);

    let mut blueprint = Blueprint::parse_str(&blueprint_text(&fixture, "")).unwrap();
    blueprint.init_modules = vec![first, second];

    let image = Image::build(&blueprint).unwrap();
    let kickstart = image.kickstart();
    let word_at = |offset: usize| {
        u32::from_le_bytes(kickstart[offset..offset + 4].try_into().unwrap())
    };

    let table = word_at(16);
    assert!(table >= image.kickstart_base());
    assert_eq!(table % 4, 0);

    let table_offset = (table - image.kickstart_base()) as usize;
    let first_entry = word_at(table_offset);
    let second_entry = word_at(table_offset + 4);
    assert_eq!(word_at(table_offset + 8), 0);

    // Entries point at 8-byte-aligned module bases plus their ELF entries.
    assert_eq!((first_entry - 0x8) % 8, 0);
    assert_eq!((second_entry - 0xC) % 8, 0);

    // Module bytes are present in the staged kickstart.
    let first_base = first_entry - 0x8;
    let offset = (first_base - image.kickstart_base()) as usize;
    assert_eq!(&kickstart[offset..offset + 0x28], &[0x11u8; 0x28]);

    let second_base = second_entry - 0xC;
    let offset = (second_base - image.kickstart_base()) as usize;
    assert_eq!(&kickstart[offset..offset + 0x28], &[0x22u8; 0x28]);
    assert!(second_base > first_base);

    // The output records the full staged extent as the segment's memsz.
    let elf = ElfFile::from_bytes(image.to_bytes()).unwrap();
    let phdrs = elf.program_headers().unwrap();
    assert_eq!(
        phdrs[1].p_memsz,
        image.allocation_end() - image.kickstart_base()
    );
    assert_eq!(image.allocation_end(), second_base + 0x28);
}

#[test]
fn blueprint_parse_failure_reports_blueprint_error() {
    let err = Blueprint::parse_str("MODULE only-a-name\n").unwrap_err();
    assert_eq!(err.category(), "blueprint");
}

#[test]
fn missing_kernel_file_fails_with_io_error() {
    let fixture = setup();
    let text = format!(
        "IMAGE_BASE 0x80000000\nKICKSTART \"{}\"\nMODULE kernel \"elf kernel\" \"/nonexistent/k.elf\"\n",
        fixture.kickstart.display(),
    );
    let err = Image::build(&Blueprint::parse_str(&text).unwrap()).unwrap_err();
    assert_eq!(err.category(), "io");
    assert!(err.to_string().contains("/nonexistent/k.elf"));
}
