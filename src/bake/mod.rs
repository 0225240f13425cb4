//! Turning layer source images into uniform slices and slices into arrays.

pub mod assemble;
pub mod builder;
pub mod channels;

use image::RgbaImage;
use image::imageops;
use image::imageops::FilterType;
use tracing::warn;

pub use builder::BuildError;
pub use builder::build_array;
pub use channels::HeightBounds;
pub use channels::pack_albedo_smoothness;
pub use channels::pack_height_ao;
pub use channels::pack_normal;

use crate::profile::ProfileSettings;
use crate::texture::ArrayClass;
use crate::texture::ColorSpace;
use crate::texture::SamplerState;
use crate::texture::Texture;
use crate::texture::TextureFormat;
use crate::texture::color;

/// Produces a `width` x `height` copy of `image`.
///
/// The result keeps the source's sampler state and is tagged with
/// `color_space`. sRGB sources are filtered in linear light. When `mipmaps`
/// is set the full chain is generated, and only then is `format` applied if
/// `compress` is set and `format` is a block format. When the size already
/// matches, pixels are copied through untouched.
pub fn resample(
    image: &Texture,
    format: TextureFormat,
    width: u32,
    height: u32,
    mipmaps: bool,
    color_space: ColorSpace,
    compress: bool,
) -> Texture {
    let (src_width, src_height) = image.dimensions();
    let base = if (src_width, src_height) == (width, height) {
        image.base().clone()
    } else if src_width == 0 || src_height == 0 {
        warn!(name = image.name(), "resampling an empty image, filling with zeros");
        RgbaImage::new(width, height)
    } else {
        match image.color_space() {
            ColorSpace::Srgb => {
                color::resize_linear_light(image.base(), width, height, FilterType::Triangle)
            }
            ColorSpace::Linear => imageops::resize(image.base(), width, height, FilterType::Triangle),
        }
    };

    let mut out = Texture::new(image.name(), base)
        .with_color_space(color_space)
        .with_sampler(image.sampler());
    if mipmaps {
        out.generate_mips();
    }
    if compress && format.is_compressed() {
        out.set_format(format);
    }
    out
}

/// Target geometry and sampling for every slice of one array class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceSpec {
    pub class: ArrayClass,
    pub size: u32,
    pub compress: bool,
    pub sampler: SamplerState,
}

impl SliceSpec {
    pub fn for_class(class: ArrayClass, settings: &ProfileSettings) -> Self {
        let (size, compress, filter, aniso) = match class {
            ArrayClass::Albedo => (
                settings.albedo_size(),
                settings.albedo_compress(),
                settings.albedo_filter(),
                settings.albedo_aniso(),
            ),
            ArrayClass::Normal => (
                settings.normal_size(),
                settings.normal_compress(),
                settings.normal_filter(),
                settings.normal_aniso(),
            ),
        };
        Self {
            class,
            size: size.pixels(),
            compress,
            sampler: SamplerState {
                filter,
                aniso,
                ..SamplerState::default()
            },
        }
    }

    pub fn format(&self) -> TextureFormat {
        if self.compress {
            self.class.compressed_format()
        } else {
            TextureFormat::Rgba8
        }
    }

    pub fn color_space(&self) -> ColorSpace {
        self.class.color_space()
    }

    /// Brings a source image to slice size without mips, for channel reads.
    pub(crate) fn intermediate(&self, image: &Texture) -> Texture {
        resample(
            image,
            TextureFormat::Rgba8,
            self.size,
            self.size,
            false,
            image.color_space(),
            false,
        )
    }

    /// Resamples a source image straight into a finished slice, keeping its
    /// own sampler state.
    pub(crate) fn passthrough(&self, image: &Texture) -> Texture {
        resample(
            image,
            self.format(),
            self.size,
            self.size,
            true,
            self.color_space(),
            self.compress,
        )
    }

    /// Tags a freshly packed image with this class's sampling, then builds
    /// its chain and applies compression.
    pub(crate) fn finish(&self, texture: Texture) -> Texture {
        let mut texture = texture
            .with_color_space(self.color_space())
            .with_sampler(self.sampler);
        texture.generate_mips();
        if self.compress {
            texture.set_format(self.format());
        }
        texture
    }
}
