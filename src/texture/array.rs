use image::RgbaImage;

use super::ArrayClass;
use super::ColorSpace;
use super::SamplerState;
use super::TextureFormat;

/// A layered texture: `slice_count` slices of identical size, mip count and
/// format. Only [`crate::bake::build_array`] constructs these, so the
/// uniformity holds for every value of this type.
#[derive(Debug, Clone)]
pub struct TextureArray {
    pub(crate) name: String,
    pub(crate) class: ArrayClass,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) mip_count: u32,
    pub(crate) format: TextureFormat,
    pub(crate) color_space: ColorSpace,
    pub(crate) sampler: SamplerState,
    /// Indexed `[slice][mip]`.
    pub(crate) slices: Vec<Vec<RgbaImage>>,
}

impl TextureArray {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> ArrayClass {
        self.class
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mip_count(&self) -> u32 {
        self.mip_count
    }

    pub fn slice_count(&self) -> u32 {
        self.slices.len() as u32
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

    pub fn slice(&self, slice: u32) -> Option<&[RgbaImage]> {
        self.slices.get(slice as usize).map(Vec::as_slice)
    }

    pub fn slice_mip(&self, slice: u32, mip: u32) -> Option<&RgbaImage> {
        self.slice(slice)?.get(mip as usize)
    }

    /// Raw RGBA8 bytes of one slice at one mip level.
    pub fn slice_bytes(&self, slice: u32, mip: u32) -> Option<&[u8]> {
        self.slice_mip(slice, mip).map(|image| image.as_raw().as_slice())
    }

    pub fn slices(&self) -> impl Iterator<Item = &[RgbaImage]> {
        self.slices.iter().map(Vec::as_slice)
    }
}
