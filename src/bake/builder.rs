use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::texture::ArrayClass;
use crate::texture::Texture;
use crate::texture::TextureArray;
use crate::texture::TextureFormat;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("no slices to build the {class} array from")]
    EmptySliceList { class: ArrayClass },
    #[error("slice {index} ({name}) is {width}x{height}, expected {expected_width}x{expected_height}")]
    NonUniformSize {
        index: usize,
        name: String,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
    #[error("slice {index} ({name}) has {found} mips, expected {expected}")]
    MipCountMismatch {
        index: usize,
        name: String,
        found: u32,
        expected: u32,
    },
    #[error("slice {index} ({name}) is stored as {found:?}, expected {expected:?}")]
    FormatMismatch {
        index: usize,
        name: String,
        found: TextureFormat,
        expected: TextureFormat,
    },
}

/// Builds a texture array from uniform slices, moving each slice's whole
/// mip chain into place. Slice `i` of the result is `slices[i]`.
///
/// The array takes its size, mip count and format from the slices, its
/// sampler from the first slice and its colour space from `class`. Nothing is
/// produced if the slices disagree.
pub fn build_array(
    name: &str,
    slices: Vec<Texture>,
    class: ArrayClass,
) -> Result<TextureArray, BuildError> {
    let Some(first) = slices.first() else {
        warn!(%class, "refusing to build array with no slices");
        return Err(BuildError::EmptySliceList { class });
    };

    let (width, height) = first.dimensions();
    let mip_count = first.mip_count();
    let format = first.format();
    let sampler = first.sampler();

    for (index, slice) in slices.iter().enumerate() {
        let err = if slice.dimensions() != (width, height) {
            Some(BuildError::NonUniformSize {
                index,
                name: slice.name().to_string(),
                width: slice.width(),
                height: slice.height(),
                expected_width: width,
                expected_height: height,
            })
        } else if slice.mip_count() != mip_count {
            Some(BuildError::MipCountMismatch {
                index,
                name: slice.name().to_string(),
                found: slice.mip_count(),
                expected: mip_count,
            })
        } else if slice.format() != format {
            Some(BuildError::FormatMismatch {
                index,
                name: slice.name().to_string(),
                found: slice.format(),
                expected: format,
            })
        } else {
            None
        };

        if let Some(err) = err {
            warn!(%class, %err, "array build refused");
            return Err(err);
        }
    }

    let slices: Vec<_> = slices.into_iter().map(Texture::into_mips).collect();
    info!(
        %class,
        slices = slices.len(),
        width,
        height,
        mip_count,
        "built texture array"
    );

    Ok(TextureArray {
        name: name.to_string(),
        class,
        width,
        height,
        mip_count,
        format,
        color_space: class.color_space(),
        sampler,
        slices,
    })
}
