//! A profile is the unit that gets baked: an ordered layer registry, the
//! global layers, bake settings, the two built arrays and their dirty state.
//!
//! Every mutation that can change baked output is a command returning the
//! [`ChangedFlags`] it caused. Rebuilds never happen implicitly; the owner
//! calls [`Profile::rebuild`] when it is ready to pay for one.

mod dirty;
mod globals;
mod layer;
mod registry;
mod settings;

use tracing::info;
use tracing::warn;

pub use dirty::ArrayState;
pub use dirty::ChangedFlags;
pub use dirty::DirtyTracker;
pub use globals::DetailNormal;
pub use globals::DetailNormalParams;
pub use globals::GeologicalLayer;
pub use globals::GeologicalParams;
pub use globals::GlobalLayers;
pub use globals::GlobalSlot;
pub use globals::SnowBaked;
pub use globals::SnowInputs;
pub use globals::SnowLayer;
pub use globals::SnowParams;
pub use layer::BakedLayer;
pub use layer::InputSlot;
pub use layer::LayerDescriptor;
pub use layer::LayerInputs;
pub use layer::LayerParams;
pub use layer::MAX_PAINT_LAYERS;
pub use layer::Tiling;
pub use registry::LayerRegistry;
pub use registry::RegistryError;
pub use settings::AoType;
pub use settings::GlobalShading;
pub use settings::ProfileSettings;
pub use settings::ShaderType;

use crate::Rc;
use crate::bake::BuildError;
use crate::bake::assemble;
use crate::bake::assemble::Progress;
use crate::bake::build_array;
use crate::texture::ArrayClass;
use crate::texture::FilterMode;
use crate::texture::ImageRef;
use crate::texture::TextureArray;
use crate::texture::TextureSize;

/// Outcome of rebuilding one array class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassRebuild {
    /// The class was clean; the previous array is still current.
    Skipped,
    Built { slices: u32 },
    /// The previous array (if any) was kept and the class stays dirty.
    Failed(BuildError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    pub albedo: ClassRebuild,
    pub normal: ClassRebuild,
}

impl RebuildReport {
    pub fn get(&self, class: ArrayClass) -> &ClassRebuild {
        match class {
            ArrayClass::Albedo => &self.albedo,
            ArrayClass::Normal => &self.normal,
        }
    }

    pub fn built_any(&self) -> bool {
        matches!(self.albedo, ClassRebuild::Built { .. })
            || matches!(self.normal, ClassRebuild::Built { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Profile {
    name: String,
    settings: ProfileSettings,
    registry: LayerRegistry,
    dirty: DirtyTracker,
    albedo_array: Option<Rc<TextureArray>>,
    normal_array: Option<Rc<TextureArray>>,
}

impl Profile {
    pub fn new(name: impl Into<String>, settings: ProfileSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &ProfileSettings {
        &self.settings
    }

    /// Shading values that do not affect baking can be edited freely.
    pub fn shading_mut(&mut self) -> &mut GlobalShading {
        &mut self.settings.shading
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    /// Parameter access. Inputs on the returned registry can only be changed
    /// through the profile's commands.
    pub fn registry_mut(&mut self) -> &mut LayerRegistry {
        &mut self.registry
    }

    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub fn albedo_array(&self) -> Option<&Rc<TextureArray>> {
        self.albedo_array.as_ref()
    }

    pub fn normal_array(&self) -> Option<&Rc<TextureArray>> {
        self.normal_array.as_ref()
    }

    pub fn array(&self, class: ArrayClass) -> Option<&Rc<TextureArray>> {
        match class {
            ArrayClass::Albedo => self.albedo_array(),
            ArrayClass::Normal => self.normal_array(),
        }
    }

    fn observe(&mut self, changed: ChangedFlags) -> ChangedFlags {
        self.dirty.observe(changed);
        changed
    }

    pub fn add_layer(&mut self, layer: LayerDescriptor) -> Result<ChangedFlags, RegistryError> {
        let changed = self.registry.push(layer)?;
        Ok(self.observe(changed))
    }

    pub fn remove_layer(&mut self, index: usize) -> Result<ChangedFlags, RegistryError> {
        self.registry.remove(index)?;
        Ok(self.observe(ChangedFlags::BOTH))
    }

    pub fn truncate_layers(&mut self, len: usize) -> ChangedFlags {
        let changed = self.registry.truncate(len);
        self.observe(changed)
    }

    pub fn set_layer_input(
        &mut self,
        layer: usize,
        slot: InputSlot,
        image: Option<ImageRef>,
    ) -> Result<ChangedFlags, RegistryError> {
        let changed = self.registry.set_layer_input(layer, slot, image)?;
        Ok(self.observe(changed))
    }

    pub fn set_layer_albedo(
        &mut self,
        layer: usize,
        image: Option<ImageRef>,
    ) -> Result<ChangedFlags, RegistryError> {
        self.set_layer_input(layer, InputSlot::Albedo, image)
    }

    pub fn set_layer_normal(
        &mut self,
        layer: usize,
        image: Option<ImageRef>,
    ) -> Result<ChangedFlags, RegistryError> {
        self.set_layer_input(layer, InputSlot::Normal, image)
    }

    pub fn set_layer_tiling(
        &mut self,
        layer: usize,
        tiling: Tiling,
    ) -> Result<ChangedFlags, RegistryError> {
        let changed = self.registry.set_layer_tiling(layer, tiling)?;
        Ok(self.observe(changed))
    }

    pub fn set_global_input(&mut self, slot: GlobalSlot, image: Option<ImageRef>) -> ChangedFlags {
        let changed = self.registry.set_global(slot, image);
        self.observe(changed)
    }

    pub fn set_albedo_size(&mut self, size: TextureSize) -> ChangedFlags {
        self.class_setting(ArrayClass::Albedo, |s| s.set_albedo_size(size))
    }

    pub fn set_normal_size(&mut self, size: TextureSize) -> ChangedFlags {
        self.class_setting(ArrayClass::Normal, |s| s.set_normal_size(size))
    }

    pub fn set_albedo_compression(&mut self, compress: bool) -> ChangedFlags {
        self.class_setting(ArrayClass::Albedo, |s| s.set_albedo_compress(compress))
    }

    pub fn set_normal_compression(&mut self, compress: bool) -> ChangedFlags {
        self.class_setting(ArrayClass::Normal, |s| s.set_normal_compress(compress))
    }

    pub fn set_albedo_sampling(&mut self, filter: FilterMode, aniso: u8) -> ChangedFlags {
        self.class_setting(ArrayClass::Albedo, |s| s.set_albedo_sampling(filter, aniso))
    }

    pub fn set_normal_sampling(&mut self, filter: FilterMode, aniso: u8) -> ChangedFlags {
        self.class_setting(ArrayClass::Normal, |s| s.set_normal_sampling(filter, aniso))
    }

    /// Only a switch that changes whether height/AO slices are sampled
    /// invalidates the albedo array.
    pub fn set_shader_type(&mut self, shader_type: ShaderType) -> ChangedFlags {
        let before = self.settings.shader_type().samples_height_ao();
        if !self.settings.set_shader_type(shader_type) || before == shader_type.samples_height_ao() {
            return ChangedFlags::NONE;
        }
        self.observe(ChangedFlags::only(ArrayClass::Albedo))
    }

    fn class_setting(
        &mut self,
        class: ArrayClass,
        apply: impl FnOnce(&mut ProfileSettings) -> bool,
    ) -> ChangedFlags {
        if apply(&mut self.settings) {
            self.observe(ChangedFlags::only(class))
        } else {
            ChangedFlags::NONE
        }
    }

    /// Marks both classes dirty regardless of inputs.
    pub fn force_update(&mut self) {
        self.observe(ChangedFlags::BOTH);
    }

    pub fn request_rebuild(&mut self, class: ArrayClass) {
        self.dirty.mark(class);
    }

    pub fn needs_rebuild(&self, class: ArrayClass) -> bool {
        self.dirty.is_dirty(class) || self.registry.any_changed(class)
    }

    pub fn needs_any_rebuild(&self) -> bool {
        self.needs_rebuild(ArrayClass::Albedo) || self.needs_rebuild(ArrayClass::Normal)
    }

    /// Rebuilds the albedo class, then the normal class. Each is skipped when
    /// clean.
    pub fn rebuild(&mut self, progress: Option<&mut dyn FnMut(Progress<'_>)>) -> RebuildReport {
        match progress {
            Some(progress) => RebuildReport {
                albedo: self.rebuild_class(ArrayClass::Albedo, progress),
                normal: self.rebuild_class(ArrayClass::Normal, progress),
            },
            None => RebuildReport {
                albedo: self.rebuild_class(ArrayClass::Albedo, &mut |_| {}),
                normal: self.rebuild_class(ArrayClass::Normal, &mut |_| {}),
            },
        }
    }

    pub fn rebuild_class(
        &mut self,
        class: ArrayClass,
        progress: &mut dyn FnMut(Progress<'_>),
    ) -> ClassRebuild {
        if !self.needs_rebuild(class) {
            return ClassRebuild::Skipped;
        }

        let array_name = format!("{}_{class}", self.name);
        let built = match class {
            ArrayClass::Albedo => {
                let (slices, assignment) =
                    assemble::collect_albedo_slices(&self.registry, &self.settings, progress);
                build_array(&array_name, slices, class).map(|array| {
                    self.registry.apply_albedo(assignment);
                    array
                })
            }
            ArrayClass::Normal => {
                let (slices, assignment) =
                    assemble::collect_normal_slices(&self.registry, &self.settings, progress);
                build_array(&array_name, slices, class).map(|array| {
                    self.registry.apply_normal(assignment);
                    array
                })
            }
        };

        match built {
            Ok(array) => {
                let slices = array.slice_count();
                self.registry.clear_changed(class);
                self.dirty.mark_clean(class);
                let array = Some(Rc::new(array));
                match class {
                    ArrayClass::Albedo => self.albedo_array = array,
                    ArrayClass::Normal => self.normal_array = array,
                }
                info!(profile = %self.name, %class, slices, "profile array rebuilt");
                ClassRebuild::Built { slices }
            }
            Err(err) => {
                warn!(profile = %self.name, %class, %err, "keeping previous array, class stays dirty");
                ClassRebuild::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::Texture;
    use image::Rgba;
    use image::RgbaImage;

    fn image(name: &str, value: [u8; 4]) -> ImageRef {
        Texture::new(name, RgbaImage::from_pixel(64, 64, Rgba(value))).into_shared()
    }

    fn small_settings() -> ProfileSettings {
        ProfileSettings::builder()
            .albedo_size(TextureSize::Size64)
            .normal_size(TextureSize::Size64)
            .build()
    }

    /// Layer 0: albedo + normal. Layer 1: albedo + height + AO.
    /// Layer 2: albedo + normal + roughness.
    fn three_layer_profile() -> Profile {
        let mut profile = Profile::new("meadow", small_settings());
        profile
            .add_layer(LayerDescriptor::new(
                "grass",
                LayerInputs {
                    albedo: Some(image("grass_a", [40, 120, 30, 255])),
                    normal: Some(image("grass_n", [128, 128, 255, 255])),
                    ..Default::default()
                },
            ))
            .unwrap();
        profile
            .add_layer(LayerDescriptor::new(
                "dirt",
                LayerInputs {
                    albedo: Some(image("dirt_a", [90, 60, 40, 255])),
                    height: Some(image("dirt_h", [0, 77, 0, 255])),
                    ambient_occlusion: Some(image("dirt_ao", [0, 200, 0, 255])),
                    ..Default::default()
                },
            ))
            .unwrap();
        profile
            .add_layer(LayerDescriptor::new(
                "rock",
                LayerInputs {
                    albedo: Some(image("rock_a", [110, 110, 110, 255])),
                    normal: Some(image("rock_n", [120, 140, 250, 255])),
                    roughness: Some(image("rock_r", [0, 60, 0, 255])),
                    ..Default::default()
                },
            ))
            .unwrap();
        profile
    }

    #[test]
    fn three_layer_scenario_places_slices() {
        let mut profile = three_layer_profile();
        let report = profile.rebuild(None);

        assert_eq!(report.albedo, ClassRebuild::Built { slices: 4 });
        assert_eq!(report.normal, ClassRebuild::Built { slices: 2 });

        let layers = profile.registry().layers();
        assert_eq!(layers[0].baked().albedo_index(), Some(0));
        assert_eq!(layers[0].baked().height_ao_index(), None);
        assert_eq!(layers[0].baked().normal_index(), Some(0));

        assert_eq!(layers[1].baked().albedo_index(), Some(1));
        assert_eq!(layers[1].baked().height_ao_index(), Some(2));
        assert_eq!(layers[1].baked().normal_index(), None);
        assert_eq!(layers[1].baked().height_bounds().min, 77);

        assert_eq!(layers[2].baked().albedo_index(), Some(3));
        assert_eq!(layers[2].baked().height_ao_index(), None);
        assert_eq!(layers[2].baked().normal_index(), Some(1));

        let albedo = profile.albedo_array().unwrap();
        assert_eq!(albedo.slice_bytes(2, 0).unwrap()[..4], [77, 77, 77, 200]);
        assert_eq!(albedo.slice_bytes(3, 0).unwrap()[3], 195);
        let normal = profile.normal_array().unwrap();
        assert_eq!(normal.slice_bytes(1, 0).unwrap()[..4], [0x80, 140, 0x80, 255]);
    }

    #[test]
    fn every_built_slice_is_uniform() {
        let mut profile = three_layer_profile();
        profile.rebuild(None);

        for array in [profile.albedo_array().unwrap(), profile.normal_array().unwrap()] {
            for slice in array.slices() {
                assert_eq!(slice.len() as u32, array.mip_count());
                for (level, mip) in slice.iter().enumerate() {
                    assert_eq!(mip.width(), (array.width() >> level).max(1));
                    assert_eq!(mip.height(), (array.height() >> level).max(1));
                }
            }
        }
    }

    #[test]
    fn forced_rebuilds_are_idempotent() {
        let mut profile = three_layer_profile();
        profile.rebuild(None);
        let first_albedo = profile.albedo_array().unwrap().clone();
        let first_normal = profile.normal_array().unwrap().clone();
        let first_indices: Vec<_> = profile.registry().layers().iter().map(|l| *l.baked()).collect();

        profile.force_update();
        let report = profile.rebuild(None);
        assert!(report.built_any());

        let second_albedo = profile.albedo_array().unwrap();
        let second_normal = profile.normal_array().unwrap();
        assert!(!Rc::ptr_eq(&first_albedo, second_albedo));
        for (a, b) in [(&first_albedo, second_albedo), (&first_normal, second_normal)] {
            assert_eq!(a.slice_count(), b.slice_count());
            for slice in 0..a.slice_count() {
                for mip in 0..a.mip_count() {
                    assert_eq!(a.slice_bytes(slice, mip), b.slice_bytes(slice, mip));
                }
            }
        }
        let second_indices: Vec<_> = profile.registry().layers().iter().map(|l| *l.baked()).collect();
        assert_eq!(first_indices, second_indices);
    }

    #[test]
    fn clean_classes_are_skipped() {
        let mut profile = three_layer_profile();
        profile.rebuild(None);
        let albedo = profile.albedo_array().unwrap().clone();

        let report = profile.rebuild(None);
        assert_eq!(report.albedo, ClassRebuild::Skipped);
        assert_eq!(report.normal, ClassRebuild::Skipped);
        assert!(Rc::ptr_eq(&albedo, profile.albedo_array().unwrap()));

        let changed = profile.set_layer_normal(1, Some(image("dirt_n", [1, 2, 3, 4]))).unwrap();
        assert_eq!(changed, ChangedFlags::only(ArrayClass::Normal));
        let report = profile.rebuild(None);
        assert_eq!(report.albedo, ClassRebuild::Skipped);
        assert_eq!(report.normal, ClassRebuild::Built { slices: 3 });
        assert!(Rc::ptr_eq(&albedo, profile.albedo_array().unwrap()));
    }

    #[test]
    fn failed_build_keeps_previous_array_and_stays_dirty() {
        let mut profile = three_layer_profile();
        profile.rebuild(None);
        let normal = profile.normal_array().unwrap().clone();

        profile.set_layer_normal(0, None).unwrap();
        profile.set_layer_normal(2, None).unwrap();
        let report = profile.rebuild(None);

        assert_eq!(
            report.normal,
            ClassRebuild::Failed(BuildError::EmptySliceList { class: ArrayClass::Normal })
        );
        assert!(Rc::ptr_eq(&normal, profile.normal_array().unwrap()));
        assert!(profile.needs_rebuild(ArrayClass::Normal));
        // Indices from the last good build are untouched.
        assert_eq!(profile.registry().layers()[2].baked().normal_index(), Some(1));
    }

    #[test]
    fn basic_shader_drops_height_ao_slices() {
        let mut profile = three_layer_profile();
        profile.rebuild(None);

        assert_eq!(profile.set_shader_type(ShaderType::Tessellation), ChangedFlags::NONE);
        assert_eq!(
            profile.set_shader_type(ShaderType::Basic),
            ChangedFlags::only(ArrayClass::Albedo)
        );
        let report = profile.rebuild(None);
        assert_eq!(report.albedo, ClassRebuild::Built { slices: 3 });
        assert_eq!(profile.registry().layers()[1].baked().height_ao_index(), None);
        assert_eq!(profile.registry().layers()[2].baked().albedo_index(), Some(2));
    }

    #[test]
    fn snow_and_detail_globals_append_after_layers() {
        let mut profile = three_layer_profile();
        profile.set_global_input(GlobalSlot::SnowAlbedo, Some(image("snow_a", [250, 250, 250, 255])));
        profile.set_global_input(GlobalSlot::SnowNoise, Some(image("snow_noise", [0, 33, 0, 255])));
        profile.set_global_input(GlobalSlot::SnowNormal, Some(image("snow_n", [128, 128, 255, 255])));
        profile.set_global_input(GlobalSlot::DetailNormal, Some(image("detail", [128, 128, 255, 255])));
        assert_eq!(
            profile.set_global_input(GlobalSlot::GeologicalAlbedo, Some(image("geo", [0; 4]))),
            ChangedFlags::NONE
        );

        let mut seen = Vec::new();
        let record: &mut dyn FnMut(Progress<'_>) =
            &mut |p: Progress<'_>| seen.push((p.class, p.completed, p.total));
        profile.rebuild(Some(record));

        let snow = profile.registry().globals().snow.baked();
        assert_eq!(snow.albedo_index(), Some(4));
        assert_eq!(snow.height_ao_index(), None);
        assert_eq!(snow.noise_index(), Some(5));
        assert_eq!(snow.normal_index(), Some(2));
        assert_eq!(profile.registry().globals().detail_normal.index(), Some(3));

        let noise = profile.albedo_array().unwrap().slice_bytes(5, 0).unwrap();
        assert_eq!(noise[..4], [0, 0, 0, 33]);

        assert_eq!(seen.first(), Some(&(ArrayClass::Albedo, 0, 6)));
        assert_eq!(seen.last(), Some(&(ArrayClass::Normal, 5, 5)));
    }
}
