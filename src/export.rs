// Raster export of the rendered canvas. Only pixels leave the process;
// generated geometry is never written out.

use image::{Rgb, RgbImage};
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::render::Canvas;

pub fn to_image(canvas: &Canvas) -> RgbImage {
    RgbImage::from_fn(canvas.width as u32, canvas.height as u32, |x, y| {
        let px = canvas.pixels()[y as usize * canvas.width + x as usize];
        Rgb([(px >> 16) as u8, (px >> 8) as u8, px as u8])
    })
}

/// Writes the canvas as an image; the format follows the file extension.
pub fn save_png<P: AsRef<Path>>(canvas: &Canvas, path: P) -> Result<()> {
    to_image(canvas).save(path.as_ref())?;
    info!(path = %path.as_ref().display(), "exported frame");
    Ok(())
}
