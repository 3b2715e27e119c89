#![allow(dead_code)]

use std::path::{Path, PathBuf};

use object::write::{Object, Symbol, SymbolSection};
use object::{
    Architecture, BinaryFormat, Endianness, SectionKind, SymbolFlags, SymbolKind, SymbolScope,
};

/// Distinctive `.text` contents so the section can be found in the written file.
pub fn text_bytes() -> Vec<u8> {
    (0x80u8..0xB0).collect()
}

/// Relocatable x86_64 ELF with `babi_parse` (0x00..0x10), `babi_main`
/// (0x10..0x20) and `libc_strcpy` (0x20..0x28) in `.text`.
pub fn build_elf() -> Vec<u8> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    let text_id = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    obj.section_mut(text_id).set_data(text_bytes(), 16);

    let symbols = [("babi_parse", 0x00, 0x10), ("babi_main", 0x10, 0x10), ("libc_strcpy", 0x20, 0x08)];
    for (name, value, size) in symbols {
        obj.add_symbol(Symbol {
            name: name.as_bytes().to_vec(),
            value,
            size,
            kind: SymbolKind::Text,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Section(text_id),
            flags: SymbolFlags::Elf { st_info: 0x12, st_other: 0 },
        });
    }
    obj.write().expect("write ELF fixture")
}

pub fn text_offset(bytes: &[u8]) -> usize {
    let needle = text_bytes();
    bytes.windows(needle.len()).position(|w| w == needle.as_slice()).expect(".text in fixture")
}

/// Write `babi.orig` and a `babi` with the given `.text`-relative bytes flipped.
/// Returns `(modified, original, text_offset)`.
pub fn write_pair(dir: &Path, text_patch: &[usize]) -> (PathBuf, PathBuf, usize) {
    let original = build_elf();
    let text = text_offset(&original);
    let mut modified = original.clone();
    for rel in text_patch {
        modified[text + rel] ^= 0xFF;
    }
    let original_path = dir.join("babi.orig");
    let modified_path = dir.join("babi");
    std::fs::write(&original_path, &original).unwrap();
    std::fs::write(&modified_path, &modified).unwrap();
    (modified_path, original_path, text)
}
