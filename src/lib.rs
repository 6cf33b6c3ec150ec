//! Repairs COLLADA documents from exporters that name joints by generated identifiers and bake a
//! rotation into skeleton roots.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::{asset::Asset, format::collada::Collada};

pub mod asset;
pub mod correction;
pub mod error;
pub mod format;
pub mod math;
pub mod repair;

/// Runs the text repair and the geometric correction on a document held in memory.
pub fn fix_document(text: &str) -> Result<String> {
    let repaired = repair::repair_document(text).context("text repair failed")?;
    let corrected = correct(&repaired).context("geometric correction failed")?;

    Ok(corrected)
}

fn correct(text: &str) -> error::Result<String> {
    let mut collada: Collada = text.parse()?;
    let corrections = correction::correct_scene(&mut collada)?;
    tracing::info!("Corrected {} scene root(s)", corrections.len());

    collada.to_string()
}

/// Fixes the document at `input` and writes it to `output`, or next to the input with a
/// `-fixed` suffix. Returns the path written.
pub fn run(input: impl AsRef<Path>, output: Option<PathBuf>) -> Result<PathBuf> {
    let input = input.as_ref();
    let asset = Asset::from_path(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let text = asset
        .text()
        .with_context(|| format!("Failed to decode {}", input.display()))?;
    tracing::info!("Fixing \"{}\"", asset.name());

    let fixed = fix_document(text)?;

    let output = output.unwrap_or_else(|| asset.fixed_path());
    Asset::new(fixed.into_bytes(), &output)
        .write()
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!("Wrote {}", output.display());

    Ok(output)
}
