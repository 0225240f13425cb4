//! Persists built texture arrays.

use std::path::Path;
use std::path::PathBuf;

use image::ImageFormat;
use rootcause::Report;
use thiserror::Error;
use tracing::debug;
use tracing::info;

use crate::texture::TextureArray;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("PNG encode error: {0}")]
    PngEncode(String),
    #[cfg(feature = "dds")]
    #[error("DDS container error: {0}")]
    Dds(String),
    #[error("slice {slice} mip {mip} does not fit the container layout")]
    Layout { slice: u32, mip: u32 },
}

/// Writes mip 0 of every slice as `{prefix}_{class}_{index:02}.png` under
/// `dir`, creating it if needed. Returns the written paths in slice order.
pub fn write_slices_png(array: &TextureArray, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, Report<ExportError>> {
    std::fs::create_dir_all(dir).map_err(|e| {
        Report::new(ExportError::Io(e.to_string())).attach(format!("directory: {}", dir.display()))
    })?;

    let mut written = Vec::with_capacity(array.slice_count() as usize);
    for (index, mips) in array.slices().enumerate() {
        let Some(base) = mips.first() else {
            continue;
        };
        let path = dir.join(format!("{prefix}_{}_{index:02}.png", array.class()));
        base.save_with_format(&path, ImageFormat::Png).map_err(|e| {
            Report::new(ExportError::PngEncode(e.to_string())).attach(format!("path: {}", path.display()))
        })?;
        debug!(?path, "wrote slice");
        written.push(path);
    }

    info!(array = array.name(), slices = written.len(), ?dir, "exported PNG slices");
    Ok(written)
}

/// Writes the whole array, every slice with its mip chain, as a DX10 DDS
/// container. sRGB arrays are tagged `R8G8B8A8_UNorm_sRGB`.
#[cfg(feature = "dds")]
pub fn write_array_dds(array: &TextureArray, path: &Path) -> Result<(), Report<ExportError>> {
    use ddsfile::AlphaMode;
    use ddsfile::D3D10ResourceDimension;
    use ddsfile::Dds;
    use ddsfile::DxgiFormat;
    use ddsfile::NewDxgiParams;

    use crate::texture::ColorSpace;

    let format = match array.color_space() {
        ColorSpace::Srgb => DxgiFormat::R8G8B8A8_UNorm_sRGB,
        ColorSpace::Linear => DxgiFormat::R8G8B8A8_UNorm,
    };
    let mut dds = Dds::new_dxgi(NewDxgiParams {
        height: array.height(),
        width: array.width(),
        depth: None,
        format,
        mipmap_levels: Some(array.mip_count()),
        array_layers: Some(array.slice_count()),
        caps2: None,
        is_cubemap: false,
        resource_dimension: D3D10ResourceDimension::Texture2D,
        alpha_mode: AlphaMode::Straight,
    })
    .map_err(|e| Report::new(ExportError::Dds(e.to_string())))?;

    for (slice, mips) in array.slices().enumerate() {
        let slice = slice as u32;
        let layer = dds
            .get_mut_data(slice)
            .map_err(|e| Report::new(ExportError::Dds(e.to_string())).attach(format!("slice: {slice}")))?;
        let mut offset = 0;
        for (mip, image) in mips.iter().enumerate() {
            let bytes = image.as_raw();
            let end = offset + bytes.len();
            let target = layer.get_mut(offset..end).ok_or_else(|| {
                Report::new(ExportError::Layout {
                    slice,
                    mip: mip as u32,
                })
            })?;
            target.copy_from_slice(bytes);
            offset = end;
        }
    }

    let mut file = std::fs::File::create(path).map_err(|e| {
        Report::new(ExportError::Io(e.to_string())).attach(format!("path: {}", path.display()))
    })?;
    dds.write(&mut file).map_err(|e| {
        Report::new(ExportError::Dds(e.to_string())).attach(format!("path: {}", path.display()))
    })?;
    info!(array = array.name(), ?path, ?format, "exported DDS array");
    Ok(())
}
