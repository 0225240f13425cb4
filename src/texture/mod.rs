//! CPU-side textures with explicit mip chains, sampler metadata and a
//! colour-space tag.

pub mod array;
pub mod color;

use image::RgbaImage;
use image::imageops;
use image::imageops::FilterType;

pub use array::TextureArray;

use crate::Rc;

/// Shared handle to an image owned by the host asset store. The registry and
/// the bindings hold these; identity (not content) decides whether two
/// handles are "the same texture".
pub type ImageRef = Rc<Texture>;

/// How stored bytes should be interpreted when sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorSpace {
    #[default]
    Srgb,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterMode {
    Point,
    #[default]
    Bilinear,
    Trilinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WrapMode {
    #[default]
    Repeat,
    Clamp,
    Mirror,
}

/// Sampling metadata carried alongside pixel data.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SamplerState {
    pub filter: FilterMode,
    pub wrap: WrapMode,
    pub aniso: u8,
    pub mip_bias: f32,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            filter: FilterMode::Bilinear,
            wrap: WrapMode::Repeat,
            aniso: 1,
            mip_bias: 0.0,
        }
    }
}

/// Storage format of a texture. Pixel data is always held as RGBA8; a
/// block-compressed format is a tag telling the GPU upload path which codec
/// to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextureFormat {
    #[default]
    Rgba8,
    /// DXT5-style block compression. Used for normal slices packed into G/A.
    Bc3,
    Bc7,
}

impl TextureFormat {
    pub fn is_compressed(self) -> bool {
        !matches!(self, TextureFormat::Rgba8)
    }
}

/// Allowed slice edge lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u32", into = "u32"))]
pub enum TextureSize {
    Size64,
    Size128,
    Size256,
    Size512,
    #[default]
    Size1024,
    Size2048,
    Size4096,
}

impl TextureSize {
    pub const ALL: [TextureSize; 7] = [
        TextureSize::Size64,
        TextureSize::Size128,
        TextureSize::Size256,
        TextureSize::Size512,
        TextureSize::Size1024,
        TextureSize::Size2048,
        TextureSize::Size4096,
    ];

    pub fn pixels(self) -> u32 {
        match self {
            TextureSize::Size64 => 64,
            TextureSize::Size128 => 128,
            TextureSize::Size256 => 256,
            TextureSize::Size512 => 512,
            TextureSize::Size1024 => 1024,
            TextureSize::Size2048 => 2048,
            TextureSize::Size4096 => 4096,
        }
    }

    pub fn from_pixels(pixels: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|size| size.pixels() == pixels)
    }
}

impl From<TextureSize> for u32 {
    fn from(size: TextureSize) -> u32 {
        size.pixels()
    }
}

impl TryFrom<u32> for TextureSize {
    type Error = String;

    fn try_from(pixels: u32) -> Result<Self, Self::Error> {
        TextureSize::from_pixels(pixels)
            .ok_or_else(|| format!("{pixels} is not a supported texture size (64..=4096, power of two)"))
    }
}

/// The two array classes a profile builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArrayClass {
    Albedo,
    Normal,
}

impl ArrayClass {
    pub fn color_space(self) -> ColorSpace {
        match self {
            ArrayClass::Albedo => ColorSpace::Srgb,
            ArrayClass::Normal => ColorSpace::Linear,
        }
    }

    /// Block format used when the profile asks for compression.
    pub fn compressed_format(self) -> TextureFormat {
        match self {
            ArrayClass::Albedo => TextureFormat::Bc7,
            ArrayClass::Normal => TextureFormat::Bc3,
        }
    }
}

impl std::fmt::Display for ArrayClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrayClass::Albedo => f.write_str("albedo"),
            ArrayClass::Normal => f.write_str("normal"),
        }
    }
}

/// Number of levels in a full chain for the given base size, down to 1x1.
pub fn full_mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// An image with its mip chain. Level 0 is always present.
#[derive(Debug, Clone)]
pub struct Texture {
    name: String,
    format: TextureFormat,
    color_space: ColorSpace,
    sampler: SamplerState,
    mips: Vec<RgbaImage>,
}

impl Texture {
    /// A single-level sRGB texture with default sampling.
    pub fn new(name: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            name: name.into(),
            format: TextureFormat::Rgba8,
            color_space: ColorSpace::Srgb,
            sampler: SamplerState::default(),
            mips: vec![image],
        }
    }

    /// A single-level texture holding non-colour data.
    pub fn linear(name: impl Into<String>, image: RgbaImage) -> Self {
        Self::new(name, image).with_color_space(ColorSpace::Linear)
    }

    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerState) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn into_shared(self) -> ImageRef {
        Rc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn sampler(&self) -> SamplerState {
        self.sampler
    }

    pub fn width(&self) -> u32 {
        self.base().width()
    }

    pub fn height(&self) -> u32 {
        self.base().height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.base().dimensions()
    }

    pub fn base(&self) -> &RgbaImage {
        &self.mips[0]
    }

    pub(crate) fn base_mut(&mut self) -> &mut RgbaImage {
        &mut self.mips[0]
    }

    pub fn mip_count(&self) -> u32 {
        self.mips.len() as u32
    }

    pub fn mip(&self, level: u32) -> Option<&RgbaImage> {
        self.mips.get(level as usize)
    }

    pub fn mips(&self) -> &[RgbaImage] {
        &self.mips
    }

    pub(crate) fn into_mips(self) -> Vec<RgbaImage> {
        self.mips
    }

    pub(crate) fn set_format(&mut self, format: TextureFormat) {
        self.format = format;
    }

    /// Rebuilds the chain from level 0 by repeated halving down to 1x1.
    pub fn generate_mips(&mut self) {
        self.mips.truncate(1);
        let (mut width, mut height) = self.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        while width > 1 || height > 1 {
            width = (width / 2).max(1);
            height = (height / 2).max(1);
            let next = match self.color_space {
                ColorSpace::Srgb => color::resize_linear_light(
                    &self.mips[self.mips.len() - 1],
                    width,
                    height,
                    FilterType::Triangle,
                ),
                ColorSpace::Linear => imageops::resize(
                    &self.mips[self.mips.len() - 1],
                    width,
                    height,
                    FilterType::Triangle,
                ),
            };
            self.mips.push(next);
        }
    }
}

/// Identity comparison used by terrain reconciliation: two handles are the
/// same texture only if they point at the same allocation and agree on
/// dimensions.
pub fn is_different(a: Option<&ImageRef>, b: Option<&ImageRef>) -> bool {
    match (a, b) {
        (None, None) => false,
        (Some(a), Some(b)) => !Rc::ptr_eq(a, b) || a.dimensions() != b.dimensions(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn full_chain_reaches_one_by_one() {
        assert_eq!(full_mip_count(1, 1), 1);
        assert_eq!(full_mip_count(64, 64), 7);
        assert_eq!(full_mip_count(1024, 512), 11);

        let mut tex = Texture::linear("t", RgbaImage::from_pixel(16, 8, Rgba([10, 20, 30, 40])));
        tex.generate_mips();
        assert_eq!(tex.mip_count(), 5);
        let last = tex.mip(4).unwrap();
        assert_eq!(last.dimensions(), (1, 1));
        assert_eq!(last.get_pixel(0, 0), &Rgba([10, 20, 30, 40]));
    }

    #[test]
    fn identity_ignores_content() {
        let a = Texture::new("a", RgbaImage::new(4, 4)).into_shared();
        let b = Texture::new("a", RgbaImage::new(4, 4)).into_shared();

        assert!(!is_different(Some(&a), Some(&a.clone())));
        assert!(is_different(Some(&a), Some(&b)));
        assert!(is_different(Some(&a), None));
        assert!(!is_different(None, None));
    }

    #[test]
    fn texture_size_round_trips_pixels() {
        for size in TextureSize::ALL {
            assert_eq!(TextureSize::from_pixels(size.pixels()), Some(size));
        }
        assert_eq!(TextureSize::from_pixels(100), None);
        assert!(TextureSize::try_from(8192).is_err());
    }

    #[test]
    fn each_class_has_its_own_compressed_format() {
        assert_eq!(ArrayClass::Albedo.compressed_format(), TextureFormat::Bc7);
        assert_eq!(ArrayClass::Normal.compressed_format(), TextureFormat::Bc3);
        assert!(TextureFormat::Bc3.is_compressed());
        assert!(!TextureFormat::default().is_compressed());
    }
}
