//! Float image output.

use std::path::Path;

use anyhow::{bail, Context, Result};
use image::{Rgb, Rgb32FImage};

use pathpass::PixelBuffer;

/// Only float formats keep the accumulated radiance intact.
pub fn check_extension(path: &Path) -> Result<()> {
    match extension(path).as_deref() {
        Some("hdr") | Some("exr") => Ok(()),
        _ => bail!(
            "unsupported output '{}': use .hdr or .exr",
            path.display()
        ),
    }
}

/// Write the mean radiance of `pixels` as Radiance HDR or OpenEXR.
pub fn write_image(path: &Path, pixels: &PixelBuffer) -> Result<()> {
    check_extension(path)?;

    let img = Rgb32FImage::from_fn(pixels.width, pixels.height, |x, y| {
        let p = pixels.pixel(x, y);
        Rgb([p.x, p.y, p.z])
    });

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    img.save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
