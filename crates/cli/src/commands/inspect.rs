use anyhow::{Context, Result};
use patchguard_core::image::elf::load_layout;
use patchguard_core::policy::FunctionVerdict;
use patchguard_core::{FunctionInfo, Image, ImageLayout, PatchPolicy};
use serde::Serialize;

/// Where a single file offset lands in an image, and what the policy says about it.
#[derive(Debug, Serialize)]
pub struct OffsetLocation {
    pub offset: u64,
    pub address: Option<u64>,
    pub function: Option<FunctionInfo>,
    pub function_offset: Option<u64>,
    pub verdict: String,
}

/// List the function table of an ELF image, ordered by address.
pub fn symbols_command(image: &str, json: bool) -> Result<()> {
    let image = Image::read(image)?;
    let layout = load_layout(image.bytes())
        .with_context(|| format!("Failed to parse {} as ELF", image_label(&image)))?;

    let mut functions: Vec<FunctionInfo> = layout.functions().to_vec();
    functions.sort_by(|a, b| a.address.cmp(&b.address).then_with(|| a.name.cmp(&b.name)));

    if json {
        println!("{}", serde_json::to_string_pretty(&functions)?);
        return Ok(());
    }

    println!("Functions ({}):", functions.len());
    if functions.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    for func in functions {
        println!("  - 0x{:016x}..0x{:016x} {} ({} bytes)", func.address, func.end(), func.name, func.size);
    }
    Ok(())
}

/// Resolve where `offset` lands in `image` and whether `policy` would allow patching it.
pub fn locate_offset(image: &Image, offset: u64, policy: &PatchPolicy) -> Result<OffsetLocation> {
    let layout = load_layout(image.bytes())
        .with_context(|| format!("Failed to parse {} as ELF", image_label(image)))?;

    let address = layout.translate(offset);
    let located = address.and_then(|addr| {
        let func = layout.function_containing(addr)?;
        addr.checked_sub(func.address).map(|delta| (func.clone(), delta))
    });
    let (function, function_offset) = match located {
        Some((func, delta)) => (Some(func), Some(delta)),
        None => (None, None),
    };

    let verdict = match (address, &function) {
        (None, _) => "unmapped".to_string(),
        (Some(_), None) => "not in a function".to_string(),
        (Some(_), Some(func)) => match policy.judge(&func.name) {
            FunctionVerdict::Allowed => "allowed".to_string(),
            FunctionVerdict::Foreign => {
                format!("forbidden (name lacks `{}`)", policy.required_marker)
            }
            FunctionVerdict::Denied(marker) => format!("blacklisted (name contains `{marker}`)"),
        },
    };

    Ok(OffsetLocation { offset, address, function, function_offset, verdict })
}

/// Print where a file offset lands in an image.
pub fn locate_command(image: &str, offset: u64, policy: &PatchPolicy, json: bool) -> Result<()> {
    let image = Image::read(image)?;
    let location = locate_offset(&image, offset, policy)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&location)?);
        return Ok(());
    }

    println!("Offset: {:#x}", location.offset);
    match location.address {
        Some(addr) => println!("Address: {addr:#x}"),
        None => println!("Address: -"),
    }
    match (&location.function, location.function_offset) {
        (Some(func), Some(delta)) => println!("Function: {}+{delta:#x}", func.name),
        _ => println!("Function: -"),
    }
    println!("Verdict: {}", location.verdict);
    Ok(())
}

fn image_label(image: &Image) -> String {
    image.path().map(|p| p.display().to_string()).unwrap_or_else(|| "<memory>".to_string())
}
