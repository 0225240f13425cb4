use thiserror::Error;

use crate::bake::assemble::AlbedoAssignment;
use crate::bake::assemble::NormalAssignment;
use crate::texture::ArrayClass;
use crate::texture::ImageRef;

use super::ChangedFlags;
use super::GlobalLayers;
use super::GlobalSlot;
use super::InputSlot;
use super::LayerDescriptor;
use super::MAX_PAINT_LAYERS;
use super::Tiling;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("layer {index} is out of range ({len} layers)")]
    LayerOutOfRange { index: usize, len: usize },
    #[error("a profile holds at most {MAX_PAINT_LAYERS} paint layers")]
    LayerLimit,
}

/// Ordered paint layers plus the global layers. Slot order here is slice
/// order in the built arrays.
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    layers: Vec<LayerDescriptor>,
    globals: GlobalLayers,
}

impl LayerRegistry {
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[LayerDescriptor] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&LayerDescriptor> {
        self.layers.get(index)
    }

    /// Only the authored parameters are writable through this; inputs go
    /// through the profile's commands.
    pub fn layer_mut(&mut self, index: usize) -> Option<&mut LayerDescriptor> {
        self.layers.get_mut(index)
    }

    pub fn globals(&self) -> &GlobalLayers {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut GlobalLayers {
        &mut self.globals
    }

    fn checked(&mut self, index: usize) -> Result<&mut LayerDescriptor, RegistryError> {
        let len = self.layers.len();
        self.layers
            .get_mut(index)
            .ok_or(RegistryError::LayerOutOfRange { index, len })
    }

    pub(crate) fn push(&mut self, layer: LayerDescriptor) -> Result<ChangedFlags, RegistryError> {
        if self.layers.len() >= MAX_PAINT_LAYERS {
            return Err(RegistryError::LayerLimit);
        }
        self.layers.push(layer);
        Ok(ChangedFlags::BOTH)
    }

    pub(crate) fn remove(&mut self, index: usize) -> Result<LayerDescriptor, RegistryError> {
        let len = self.layers.len();
        if index >= len {
            return Err(RegistryError::LayerOutOfRange { index, len });
        }
        Ok(self.layers.remove(index))
    }

    pub(crate) fn truncate(&mut self, len: usize) -> ChangedFlags {
        if len >= self.layers.len() {
            return ChangedFlags::NONE;
        }
        self.layers.truncate(len);
        ChangedFlags::BOTH
    }

    pub(crate) fn set_layer_input(
        &mut self,
        index: usize,
        slot: InputSlot,
        image: Option<ImageRef>,
    ) -> Result<ChangedFlags, RegistryError> {
        Ok(self.checked(index)?.set_input(slot, image))
    }

    pub(crate) fn set_layer_tiling(
        &mut self,
        index: usize,
        tiling: Tiling,
    ) -> Result<ChangedFlags, RegistryError> {
        Ok(self.checked(index)?.set_tiling(tiling))
    }

    pub(crate) fn set_global(&mut self, slot: GlobalSlot, image: Option<ImageRef>) -> ChangedFlags {
        self.globals.set(slot, image)
    }

    pub fn any_changed(&self, class: ArrayClass) -> bool {
        self.layers.iter().any(|layer| layer.changed().get(class))
    }

    pub(crate) fn clear_changed(&mut self, class: ArrayClass) {
        for layer in &mut self.layers {
            layer.clear_changed(class);
        }
    }

    pub(crate) fn apply_albedo(&mut self, assignment: AlbedoAssignment) {
        for (layer, slots) in self.layers.iter_mut().zip(assignment.layers) {
            let baked = layer.baked_mut();
            baked.albedo_index = slots.albedo_index;
            baked.height_ao_index = slots.height_ao_index;
            baked.average = slots.average;
            baked.height = slots.height;
        }

        let snow = &mut self.globals.snow.baked;
        snow.albedo_index = assignment.snow.albedo_index;
        snow.height_ao_index = assignment.snow.height_ao_index;
        snow.noise_index = assignment.snow.noise_index;
        snow.average = assignment.snow.average;
        snow.height = assignment.snow.height;
    }

    pub(crate) fn apply_normal(&mut self, assignment: NormalAssignment) {
        for (layer, index) in self.layers.iter_mut().zip(assignment.layers) {
            layer.baked_mut().normal_index = index;
        }
        self.globals.snow.baked.normal_index = assignment.snow_normal;
        self.globals.detail_normal.index = assignment.detail_normal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::LayerInputs;

    #[test]
    fn enforces_layer_ceiling() {
        let mut registry = LayerRegistry::default();
        for i in 0..MAX_PAINT_LAYERS {
            registry
                .push(LayerDescriptor::new(format!("layer{i}"), LayerInputs::default()))
                .unwrap();
        }
        assert_eq!(
            registry.push(LayerDescriptor::new("one too many", LayerInputs::default())),
            Err(RegistryError::LayerLimit)
        );
    }

    #[test]
    fn out_of_range_commands_fail() {
        let mut registry = LayerRegistry::default();
        assert_eq!(
            registry.set_layer_tiling(0, Tiling::default()),
            Err(RegistryError::LayerOutOfRange { index: 0, len: 0 })
        );
        assert_eq!(registry.truncate(3), ChangedFlags::NONE);
    }
}
