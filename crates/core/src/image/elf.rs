use goblin::elf::{program_header, section_header, Elf};
use goblin::{mach, Object};
use tracing::debug;

use crate::error::ImageError;
use crate::image::{MappedRegion, SymbolTable};
use crate::model::FunctionInfo;

/// Parse `bytes` as an ELF image and extract its layout.
///
/// Other formats goblin recognizes are rejected as unsupported: their symbol
/// tables do not carry function sizes, so byte attribution would be guesswork.
pub fn load_layout(bytes: &[u8]) -> Result<SymbolTable, ImageError> {
    match Object::parse(bytes)? {
        Object::Elf(elf) => Ok(elf_layout(&elf)),
        Object::PE(_) => Err(ImageError::UnsupportedFormat("PE")),
        Object::Mach(mach::Mach::Binary(_)) | Object::Mach(mach::Mach::Fat(_)) => {
            Err(ImageError::UnsupportedFormat("Mach-O"))
        }
        Object::Archive(_) => Err(ImageError::UnsupportedFormat("archive")),
        _ => Err(ImageError::UnsupportedFormat("unknown")),
    }
}

fn elf_layout(elf: &Elf) -> SymbolTable {
    let mut table = SymbolTable::new();

    for region in load_regions(elf) {
        table.push_region(region);
    }
    for function in elf_functions(elf) {
        table.push_function(function);
    }

    debug!(
        regions = table.regions().len(),
        functions = table.functions().len(),
        "extracted ELF layout"
    );
    table
}

/// Loadable segments, or allocated sections when the image has no segments
/// (relocatable objects).
fn load_regions(elf: &Elf) -> Vec<MappedRegion> {
    let segments: Vec<MappedRegion> = elf
        .program_headers
        .iter()
        .filter(|ph| ph.p_type == program_header::PT_LOAD && ph.p_filesz > 0)
        .map(|ph| MappedRegion::new(ph.p_offset, ph.p_filesz, ph.p_vaddr))
        .collect();
    if !segments.is_empty() {
        return segments;
    }

    elf.section_headers
        .iter()
        .filter(|sh| {
            sh.sh_flags & u64::from(section_header::SHF_ALLOC) != 0
                && sh.sh_type != section_header::SHT_NOBITS
                && sh.sh_size > 0
        })
        .map(|sh| MappedRegion::new(sh.sh_offset, sh.sh_size, sh.sh_addr))
        .collect()
}

fn elf_functions(elf: &Elf) -> Vec<FunctionInfo> {
    let mut functions = Vec::new();
    let tables = [(&elf.syms, &elf.strtab), (&elf.dynsyms, &elf.dynstrtab)];
    for (syms, strtab) in tables {
        for sym in syms.iter() {
            if !sym.is_function()
                || sym.st_size == 0
                || sym.st_shndx == section_header::SHN_UNDEF as usize
            {
                continue;
            }
            let name = strtab.get_at(sym.st_name).unwrap_or("");
            if name.is_empty() {
                continue;
            }
            functions.push(FunctionInfo::new(name, sym.st_value, sym.st_size));
        }
    }
    functions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_not_an_image() {
        let err = load_layout(&[0u8; 64]).unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedFormat(_) | ImageError::Parse(_)));
    }

    #[test]
    fn truncated_elf_header_fails_to_parse() {
        let mut bytes = vec![0x7f, b'E', b'L', b'F', 2, 1, 1, 0];
        bytes.resize(24, 0);
        assert!(load_layout(&bytes).is_err());
    }
}
