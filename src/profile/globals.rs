//! Profile-wide layers that sit outside the paint-layer list.

use crate::bake::HeightBounds;
use crate::texture::ArrayClass;
use crate::texture::ImageRef;
use crate::texture::is_different;

use super::ChangedFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalSlot {
    SnowAlbedo,
    SnowNormal,
    SnowHeight,
    SnowAmbientOcclusion,
    SnowNoise,
    DetailNormal,
    /// Bound directly as a texture, never packed into an array.
    GeologicalAlbedo,
}

impl GlobalSlot {
    pub fn class(self) -> Option<ArrayClass> {
        match self {
            GlobalSlot::SnowNormal | GlobalSlot::DetailNormal => Some(ArrayClass::Normal),
            GlobalSlot::GeologicalAlbedo => None,
            _ => Some(ArrayClass::Albedo),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SnowParams {
    pub amount: f32,
    pub max_angle: f32,
    pub max_angle_hardness: f32,
    pub min_height: f32,
    pub min_height_blending: f32,
    pub noise_power: f32,
    pub noise_tiling: f32,
    pub normal_scale: f32,
    pub detail_power: f32,
    pub tiling_near: f32,
    pub tiling_far: f32,
    pub brightness: f32,
    pub blend_normal: f32,
    pub smoothness: f32,
    pub tint: [f32; 3],
    pub specular: f32,
    pub height_blend_near: f32,
    pub height_blend_far: f32,
    pub height_depth: f32,
    pub height_contrast: f32,
    pub tessellation_depth: f32,
    pub ao_strength: f32,
}

impl Default for SnowParams {
    fn default() -> Self {
        Self {
            amount: 0.0,
            max_angle: 40.0,
            max_angle_hardness: 1.0,
            min_height: -1000.0,
            min_height_blending: 57.0,
            noise_power: 0.8,
            noise_tiling: 0.02,
            normal_scale: 1.0,
            detail_power: 1.0,
            tiling_near: 6.9,
            tiling_far: 3.0,
            brightness: 1.0,
            blend_normal: 0.9,
            smoothness: 1.0,
            tint: [1.0, 1.0, 1.0],
            specular: 1.0,
            height_blend_near: 1.0,
            height_blend_far: 1.0,
            height_depth: 8.0,
            height_contrast: 1.0,
            tessellation_depth: 0.0,
            ao_strength: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SnowInputs {
    pub albedo: Option<ImageRef>,
    pub normal: Option<ImageRef>,
    pub height: Option<ImageRef>,
    pub ambient_occlusion: Option<ImageRef>,
    pub noise: Option<ImageRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SnowBaked {
    pub(crate) albedo_index: Option<u32>,
    pub(crate) normal_index: Option<u32>,
    pub(crate) height_ao_index: Option<u32>,
    pub(crate) noise_index: Option<u32>,
    pub(crate) average: [f32; 4],
    pub(crate) height: HeightBounds,
}

impl SnowBaked {
    pub fn albedo_index(&self) -> Option<u32> {
        self.albedo_index
    }

    pub fn normal_index(&self) -> Option<u32> {
        self.normal_index
    }

    pub fn height_ao_index(&self) -> Option<u32> {
        self.height_ao_index
    }

    pub fn noise_index(&self) -> Option<u32> {
        self.noise_index
    }

    pub fn average(&self) -> [f32; 4] {
        self.average
    }

    pub fn height_bounds(&self) -> HeightBounds {
        self.height
    }
}

#[derive(Debug, Clone, Default)]
pub struct SnowLayer {
    inputs: SnowInputs,
    pub params: SnowParams,
    pub(crate) baked: SnowBaked,
}

impl SnowLayer {
    pub fn inputs(&self) -> &SnowInputs {
        &self.inputs
    }

    pub fn baked(&self) -> &SnowBaked {
        &self.baked
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetailNormalParams {
    pub near_power: f32,
    pub near_tiling: f32,
    pub far_power: f32,
    pub far_tiling: f32,
}

impl Default for DetailNormalParams {
    fn default() -> Self {
        Self {
            near_power: 0.0,
            near_tiling: 60.0,
            far_power: 0.0,
            far_tiling: 300.0,
        }
    }
}

impl DetailNormalParams {
    pub fn is_active(&self) -> bool {
        self.near_power > 0.0 || self.far_power > 0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct DetailNormal {
    image: Option<ImageRef>,
    pub params: DetailNormalParams,
    pub(crate) index: Option<u32>,
}

impl DetailNormal {
    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    pub fn index(&self) -> Option<u32> {
        self.index
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GeologicalParams {
    pub near_offset: f32,
    pub near_power: f32,
    pub near_tiling: f32,
    pub far_offset: f32,
    pub far_power: f32,
    pub far_tiling: f32,
}

impl Default for GeologicalParams {
    fn default() -> Self {
        Self {
            near_offset: 0.0,
            near_power: 0.0,
            near_tiling: 100.0,
            far_offset: 0.0,
            far_power: 0.0,
            far_tiling: 100.0,
        }
    }
}

impl GeologicalParams {
    pub fn is_active(&self) -> bool {
        self.near_power > 0.0 || self.far_power > 0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeologicalLayer {
    albedo: Option<ImageRef>,
    pub params: GeologicalParams,
}

impl GeologicalLayer {
    pub fn albedo(&self) -> Option<&ImageRef> {
        self.albedo.as_ref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GlobalLayers {
    pub snow: SnowLayer,
    pub detail_normal: DetailNormal,
    pub geological: GeologicalLayer,
}

impl GlobalLayers {
    pub fn get(&self, slot: GlobalSlot) -> Option<&ImageRef> {
        match slot {
            GlobalSlot::SnowAlbedo => self.snow.inputs.albedo.as_ref(),
            GlobalSlot::SnowNormal => self.snow.inputs.normal.as_ref(),
            GlobalSlot::SnowHeight => self.snow.inputs.height.as_ref(),
            GlobalSlot::SnowAmbientOcclusion => self.snow.inputs.ambient_occlusion.as_ref(),
            GlobalSlot::SnowNoise => self.snow.inputs.noise.as_ref(),
            GlobalSlot::DetailNormal => self.detail_normal.image.as_ref(),
            GlobalSlot::GeologicalAlbedo => self.geological.albedo.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: GlobalSlot) -> &mut Option<ImageRef> {
        match slot {
            GlobalSlot::SnowAlbedo => &mut self.snow.inputs.albedo,
            GlobalSlot::SnowNormal => &mut self.snow.inputs.normal,
            GlobalSlot::SnowHeight => &mut self.snow.inputs.height,
            GlobalSlot::SnowAmbientOcclusion => &mut self.snow.inputs.ambient_occlusion,
            GlobalSlot::SnowNoise => &mut self.snow.inputs.noise,
            GlobalSlot::DetailNormal => &mut self.detail_normal.image,
            GlobalSlot::GeologicalAlbedo => &mut self.geological.albedo,
        }
    }

    pub(crate) fn set(&mut self, slot: GlobalSlot, image: Option<ImageRef>) -> ChangedFlags {
        let current = self.slot_mut(slot);
        if !is_different(current.as_ref(), image.as_ref()) {
            return ChangedFlags::NONE;
        }
        *current = image;
        slot.class().map(ChangedFlags::only).unwrap_or(ChangedFlags::NONE)
    }
}
