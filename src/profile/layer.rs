use crate::bake::HeightBounds;
use crate::texture::ArrayClass;
use crate::texture::ImageRef;
use crate::texture::is_different;

use super::ChangedFlags;

/// Hard ceiling on paint layers; the shader has this many parameter slots.
pub const MAX_PAINT_LAYERS: usize = 16;

/// One of the per-layer source image slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSlot {
    Albedo,
    Normal,
    Height,
    AmbientOcclusion,
    Smoothness,
    Roughness,
}

impl InputSlot {
    /// The array class whose contents depend on this slot.
    pub fn class(self) -> ArrayClass {
        match self {
            InputSlot::Normal => ArrayClass::Normal,
            _ => ArrayClass::Albedo,
        }
    }
}

/// Source image references. The asset store owns the images.
#[derive(Debug, Clone, Default)]
pub struct LayerInputs {
    pub albedo: Option<ImageRef>,
    pub normal: Option<ImageRef>,
    pub height: Option<ImageRef>,
    pub ambient_occlusion: Option<ImageRef>,
    pub smoothness: Option<ImageRef>,
    pub roughness: Option<ImageRef>,
}

impl LayerInputs {
    pub fn get(&self, slot: InputSlot) -> Option<&ImageRef> {
        match slot {
            InputSlot::Albedo => self.albedo.as_ref(),
            InputSlot::Normal => self.normal.as_ref(),
            InputSlot::Height => self.height.as_ref(),
            InputSlot::AmbientOcclusion => self.ambient_occlusion.as_ref(),
            InputSlot::Smoothness => self.smoothness.as_ref(),
            InputSlot::Roughness => self.roughness.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: InputSlot) -> &mut Option<ImageRef> {
        match slot {
            InputSlot::Albedo => &mut self.albedo,
            InputSlot::Normal => &mut self.normal,
            InputSlot::Height => &mut self.height,
            InputSlot::AmbientOcclusion => &mut self.ambient_occlusion,
            InputSlot::Smoothness => &mut self.smoothness,
            InputSlot::Roughness => &mut self.roughness,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tiling {
    pub near: f32,
    /// Multiplier applied to `near` in the distance band.
    pub far: f32,
}

impl Default for Tiling {
    fn default() -> Self {
        Self { near: 15.0, far: 3.0 }
    }
}

/// Authored shading values. None of these affect baked slices.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LayerParams {
    pub detail_power: f32,
    pub snow_reduction: f32,
    pub geological_power: f32,
    pub height_depth: f32,
    pub height_contrast: f32,
    pub height_blend_near: f32,
    pub height_blend_far: f32,
    pub tessellation_depth: f32,
    pub ao_power: f32,
    pub normal_strength: f32,
    pub tint: [f32; 3],
    pub tint_brightness: f32,
    pub smoothness: f32,
    pub triplanar: bool,
}

impl Default for LayerParams {
    fn default() -> Self {
        Self {
            detail_power: 0.0,
            snow_reduction: 0.0,
            geological_power: 1.0,
            height_depth: 8.0,
            height_contrast: 1.0,
            height_blend_near: 1.0,
            height_blend_far: 1.0,
            tessellation_depth: 0.0,
            ao_power: 1.0,
            normal_strength: 1.0,
            tint: [1.0, 1.0, 1.0],
            tint_brightness: 1.0,
            smoothness: 1.0,
            triplanar: false,
        }
    }
}

/// Results of the last successful build of each class. All indices are
/// `None` until a build places the layer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BakedLayer {
    pub(crate) albedo_index: Option<u32>,
    pub(crate) normal_index: Option<u32>,
    pub(crate) height_ao_index: Option<u32>,
    pub(crate) average: [f32; 4],
    pub(crate) height: HeightBounds,
}

impl BakedLayer {
    pub fn albedo_index(&self) -> Option<u32> {
        self.albedo_index
    }

    pub fn normal_index(&self) -> Option<u32> {
        self.normal_index
    }

    pub fn height_ao_index(&self) -> Option<u32> {
        self.height_ao_index
    }

    /// Linear average colour of the baked albedo slice.
    pub fn average(&self) -> [f32; 4] {
        self.average
    }

    pub fn height_bounds(&self) -> HeightBounds {
        self.height
    }
}

#[derive(Debug, Clone)]
pub struct LayerDescriptor {
    name: String,
    inputs: LayerInputs,
    tiling: Tiling,
    pub params: LayerParams,
    baked: BakedLayer,
    changed: ChangedFlags,
}

impl LayerDescriptor {
    /// A new layer counts as changed in both classes until first built.
    pub fn new(name: impl Into<String>, inputs: LayerInputs) -> Self {
        Self {
            name: name.into(),
            inputs,
            tiling: Tiling::default(),
            params: LayerParams::default(),
            baked: BakedLayer::default(),
            changed: ChangedFlags::BOTH,
        }
    }

    pub fn with_tiling(mut self, tiling: Tiling) -> Self {
        self.tiling = tiling;
        self
    }

    pub fn with_params(mut self, params: LayerParams) -> Self {
        self.params = params;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &LayerInputs {
        &self.inputs
    }

    pub fn input(&self, slot: InputSlot) -> Option<&ImageRef> {
        self.inputs.get(slot)
    }

    pub fn tiling(&self) -> Tiling {
        self.tiling
    }

    pub fn baked(&self) -> &BakedLayer {
        &self.baked
    }

    pub(crate) fn baked_mut(&mut self) -> &mut BakedLayer {
        &mut self.baked
    }

    pub fn changed(&self) -> ChangedFlags {
        self.changed
    }

    /// Swaps one input. Reports a change only if the reference differs.
    pub(crate) fn set_input(&mut self, slot: InputSlot, image: Option<ImageRef>) -> ChangedFlags {
        let current = self.inputs.slot_mut(slot);
        if !is_different(current.as_ref(), image.as_ref()) {
            return ChangedFlags::NONE;
        }
        *current = image;
        let flags = ChangedFlags::only(slot.class());
        self.changed |= flags;
        flags
    }

    /// Tiling is baked into the host's paint layers, so both classes count
    /// as changed.
    pub(crate) fn set_tiling(&mut self, tiling: Tiling) -> ChangedFlags {
        if self.tiling == tiling {
            return ChangedFlags::NONE;
        }
        self.tiling = tiling;
        self.changed |= ChangedFlags::BOTH;
        ChangedFlags::BOTH
    }

    pub(crate) fn clear_changed(&mut self, class: ArrayClass) {
        self.changed.clear(class);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::Texture;
    use image::RgbaImage;

    #[test]
    fn input_changes_map_to_classes() {
        let mut layer = LayerDescriptor::new("grass", LayerInputs::default());
        layer.clear_changed(ArrayClass::Albedo);
        layer.clear_changed(ArrayClass::Normal);

        let img = Texture::new("n", RgbaImage::new(2, 2)).into_shared();
        let flags = layer.set_input(InputSlot::Normal, Some(img.clone()));
        assert_eq!(flags, ChangedFlags::only(ArrayClass::Normal));
        assert!(!layer.changed().albedo);

        assert_eq!(layer.set_input(InputSlot::Normal, Some(img)), ChangedFlags::NONE);
        assert_eq!(
            layer.set_input(InputSlot::Roughness, Some(Texture::new("r", RgbaImage::new(2, 2)).into_shared())),
            ChangedFlags::only(ArrayClass::Albedo)
        );
    }

    #[test]
    fn tiling_marks_both() {
        let mut layer = LayerDescriptor::new("rock", LayerInputs::default());
        layer.clear_changed(ArrayClass::Albedo);
        layer.clear_changed(ArrayClass::Normal);

        assert_eq!(layer.set_tiling(Tiling::default()), ChangedFlags::NONE);
        assert_eq!(
            layer.set_tiling(Tiling { near: 20.0, far: 3.0 }),
            ChangedFlags::BOTH
        );
        assert_eq!(layer.changed(), ChangedFlags::BOTH);
    }
}
