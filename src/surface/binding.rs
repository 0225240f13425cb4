use image::RgbaImage;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::BindError;
use super::HostTerrain;
use super::ParamSet;
use super::PullOutcome;
use super::SurfaceMaps;
use super::SyncError;
use super::SyncMode;
use super::WeightData;
use super::basemap;
use super::bind;
use super::pull;
use super::push;
use super::reconcile;
use crate::profile::Profile;
use crate::profile::ShaderType;
use crate::profile::Tiling;
use crate::texture::FilterMode;
use crate::texture::ImageRef;
use crate::texture::SamplerState;
use crate::texture::Texture;
use crate::texture::WrapMode;

/// Which renderer currently draws the terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPath {
    /// The host's own terrain shader with its native paint layers.
    #[default]
    Native,
    /// The array-based shader driven by the generated [`ParamSet`].
    Custom,
}

/// Ties one host terrain to a profile and owns the generated material.
///
/// The profile is passed in per call rather than stored, so a single
/// profile can drive any number of bindings.
#[derive(Debug)]
pub struct TerrainSurfaceBinding<T> {
    terrain: T,
    material: Option<ParamSet>,
    path: RenderPath,
    weight_maps: Vec<ImageRef>,
    normal_map: Option<ImageRef>,
    color_map: Option<ImageRef>,
    weight_backup: Option<WeightData>,
    stripped: bool,
}

impl<T: HostTerrain> TerrainSurfaceBinding<T> {
    pub fn new(terrain: T) -> Self {
        Self {
            terrain,
            material: None,
            path: RenderPath::Native,
            weight_maps: Vec::new(),
            normal_map: None,
            color_map: None,
            weight_backup: None,
            stripped: false,
        }
    }

    pub fn terrain(&self) -> &T {
        &self.terrain
    }

    pub fn terrain_mut(&mut self) -> &mut T {
        &mut self.terrain
    }

    pub fn into_terrain(self) -> T {
        self.terrain
    }

    pub fn material(&self) -> Option<&ParamSet> {
        self.material.as_ref()
    }

    pub fn path(&self) -> RenderPath {
        self.path
    }

    pub fn weight_maps(&self) -> &[ImageRef] {
        &self.weight_maps
    }

    pub fn set_weight_maps(&mut self, maps: Vec<ImageRef>) {
        self.weight_maps = maps;
    }

    pub fn normal_map(&self) -> Option<&ImageRef> {
        self.normal_map.as_ref()
    }

    pub fn set_normal_map(&mut self, map: Option<ImageRef>) {
        self.normal_map = map;
    }

    pub fn set_color_map(&mut self, map: Option<ImageRef>) {
        self.color_map = map;
    }

    pub fn has_weight_backup(&self) -> bool {
        self.weight_backup.is_some()
    }

    /// Reconciles the terrain with the profile (profile wins), rebuilds
    /// whatever is dirty and binds the material.
    pub fn attach_profile(&mut self, profile: &mut Profile) -> Result<RenderPath, SyncError> {
        let action = reconcile(profile, &mut self.terrain, SyncMode::Attach)?;
        debug!(terrain = self.terrain.name(), ?action, "attached profile");
        if profile.needs_any_rebuild() {
            profile.rebuild(None);
        }
        Ok(self.update_material(profile))
    }

    /// Pulls the terrain's paint layers into the profile, marking both arrays
    /// dirty, then rebuilds and rebinds.
    pub fn update_profile_from_terrain_forced(&mut self, profile: &mut Profile) -> PullOutcome {
        let outcome = pull(profile, &self.terrain, true);
        profile.rebuild(None);
        self.update_material(profile);
        outcome
    }

    /// Binds the custom shader if possible, otherwise switches to the native
    /// path. A missing array marks that class dirty so the next rebuild
    /// retries it.
    pub fn update_material(&mut self, profile: &mut Profile) -> RenderPath {
        if profile.settings().shader_type() == ShaderType::Native {
            self.apply_native_path(Some(&*profile));
            return self.path;
        }

        if self.weight_maps.is_empty() {
            self.weight_maps = self.terrain.weight_maps();
        }

        let maps = SurfaceMaps {
            weight_maps: &self.weight_maps,
            normal_map: self.normal_map.as_ref(),
            color_map: self.color_map.as_ref(),
        };
        let mut material = ParamSet::default();
        match bind(profile, &maps, &mut material) {
            Ok(()) => {
                self.material = Some(material);
                self.path = RenderPath::Custom;
                info!(terrain = self.terrain.name(), profile = profile.name(), "bound custom material");
            }
            Err(err) => {
                if let BindError::MissingArray(class) = err {
                    profile.request_rebuild(class);
                }
                warn!(terrain = self.terrain.name(), %err, "falling back to native rendering");
                self.apply_native_path(Some(&*profile));
            }
        }
        self.path
    }

    /// Drops the custom material. If the host's paint data was stripped, the
    /// paint layers are pushed back from `profile` and the weights restored
    /// from the backup.
    pub fn apply_native_path(&mut self, profile: Option<&Profile>) {
        self.material = None;
        self.path = RenderPath::Native;

        if !self.stripped {
            return;
        }
        if let Some(profile) = profile {
            if let Err(err) = push(profile, &mut self.terrain) {
                warn!(terrain = self.terrain.name(), %err, "could not restore native paint layers");
            }
        }
        if let Some(backup) = &self.weight_backup {
            self.terrain.set_weights(backup.clone());
        }
        self.terrain.flush();
        self.stripped = false;
        info!(terrain = self.terrain.name(), "restored native paint data");
    }

    /// Strips native paint layers and weights from the host while the custom
    /// material is active. The weights are backed up once, on first call.
    /// Returns whether anything was stripped.
    pub fn optimize_for_runtime(&mut self, profile: &Profile) -> bool {
        if self.weight_backup.is_none() {
            self.weight_backup = Some(self.terrain.weights());
        }
        if self.path != RenderPath::Custom || !profile.settings().shading.optimise_at_runtime {
            return false;
        }
        if self.stripped {
            return true;
        }

        self.terrain.set_paint_layers(Vec::new());
        self.terrain.set_weights(WeightData::default());
        self.terrain.flush();
        self.stripped = true;
        debug!(terrain = self.terrain.name(), "stripped native paint data");
        true
    }

    fn replace_slot(
        &mut self,
        index: usize,
        tiling: Option<Tiling>,
        apply: impl FnOnce(&mut super::PaintLayer),
    ) -> Result<(), SyncError> {
        let mut layers = self.terrain.paint_layers();
        let len = layers.len();
        let Some(layer) = layers.get_mut(index) else {
            return Err(SyncError::LayerOutOfRange {
                terrain: self.terrain.name().to_string(),
                index,
                len,
            });
        };
        apply(layer);
        if let Some(tiling) = tiling {
            layer.tile_size = [tiling.near, tiling.near];
        }
        self.terrain.set_paint_layers(layers);
        self.terrain.flush();
        Ok(())
    }

    /// Writes one native paint layer's albedo (and optionally its tiling).
    pub fn replace_albedo(
        &mut self,
        index: usize,
        albedo: Option<ImageRef>,
        tiling: Option<Tiling>,
    ) -> Result<(), SyncError> {
        self.replace_slot(index, tiling, |layer| layer.albedo = albedo)
    }

    pub fn replace_normal(
        &mut self,
        index: usize,
        normal: Option<ImageRef>,
        tiling: Option<Tiling>,
    ) -> Result<(), SyncError> {
        self.replace_slot(index, tiling, |layer| layer.normal = normal)
    }

    /// Bakes a global normal map at twice the heightmap resolution from the
    /// host's interpolated normals and keeps it for the next bind. `None` if
    /// the host exposes no heightmap.
    pub fn bake_normal_map(&mut self) -> Option<ImageRef> {
        let (width, height) = self.terrain.heightmap_resolution();
        let terrain = &self.terrain;
        let image = basemap::bake_normal_map(width.saturating_mul(2), height.saturating_mul(2), |u, v| {
            terrain.interpolated_normal(u, v)
        })?;

        let sampler = SamplerState {
            filter: FilterMode::Bilinear,
            wrap: WrapMode::Clamp,
            aniso: 8,
            mip_bias: 0.0,
        };
        let map = Texture::linear(format!("{} Nrm", self.terrain.name()), image)
            .with_sampler(sampler)
            .into_shared();
        info!(
            terrain = self.terrain.name(),
            width = map.width(),
            height = map.height(),
            "baked terrain normal map"
        );
        self.normal_map = Some(map.clone());
        Some(map)
    }

    /// Base colour map from the profile's layer averages and the host's
    /// current weights. `None` if the host has no weights.
    pub fn bake_color_map(&self, profile: &Profile) -> Option<RgbaImage> {
        let averages: Vec<_> = profile
            .registry()
            .layers()
            .iter()
            .map(|layer| layer.baked().average())
            .collect();
        let weights = match &self.weight_backup {
            Some(backup) if self.stripped => backup.clone(),
            _ => self.terrain.weights(),
        };
        basemap::bake_color_map(&weights, &averages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::LayerDescriptor;
    use crate::profile::LayerInputs;
    use crate::profile::ProfileSettings;
    use crate::profile::ChangedFlags;
    use crate::surface::PaintLayer;
    use crate::surface::names;
    use crate::surface::testing::FakeTerrain;
    use crate::texture::ArrayClass;
    use crate::texture::Texture;
    use crate::texture::TextureSize;
    use image::Rgba;

    fn image_ref(name: &str, value: u8) -> ImageRef {
        Texture::new(name, RgbaImage::from_pixel(64, 64, Rgba([value, value, value, 255]))).into_shared()
    }

    fn profile_with_layer() -> Profile {
        let settings = ProfileSettings::builder()
            .albedo_size(TextureSize::Size64)
            .normal_size(TextureSize::Size64)
            .build();
        let mut profile = Profile::new("p", settings);
        profile
            .add_layer(LayerDescriptor::new(
                "grass",
                LayerInputs {
                    albedo: Some(image_ref("grass", 90)),
                    normal: Some(image_ref("grass_n", 128)),
                    ..Default::default()
                },
            ))
            .unwrap();
        profile
    }

    fn terrain() -> FakeTerrain {
        let mut terrain = FakeTerrain::new("tile", Vec::new());
        terrain.weight_maps = vec![image_ref("splat", 0)];
        let mut weights = WeightData::new(2, 2, 1);
        weights.weights.fill(1.0);
        terrain.weights = weights;
        terrain
    }

    #[test]
    fn attach_pushes_builds_and_binds() {
        let mut profile = profile_with_layer();
        let mut binding = TerrainSurfaceBinding::new(terrain());

        assert_eq!(binding.attach_profile(&mut profile).unwrap(), RenderPath::Custom);
        assert_eq!(binding.terrain().layers.len(), 1);
        assert!(binding.material().is_some());
        assert_eq!(binding.weight_maps().len(), 1);
        assert!(!profile.needs_any_rebuild());
    }

    #[test]
    fn missing_array_falls_back_and_requests_rebuild() {
        let mut profile = Profile::new("p", ProfileSettings::default());
        let mut binding = TerrainSurfaceBinding::new(terrain());

        assert_eq!(binding.update_material(&mut profile), RenderPath::Native);
        assert!(binding.material().is_none());
        assert!(profile.needs_rebuild(ArrayClass::Albedo));
    }

    #[test]
    fn optimize_then_native_restores_paint_data() {
        let mut profile = profile_with_layer();
        let mut binding = TerrainSurfaceBinding::new(terrain());
        binding.attach_profile(&mut profile).unwrap();
        let original_weights = binding.terrain().weights.clone();

        assert!(binding.optimize_for_runtime(&profile));
        assert!(binding.has_weight_backup());
        assert!(binding.terrain().layers.is_empty());
        assert!(binding.terrain().weights.is_empty());

        binding.apply_native_path(Some(&profile));
        assert_eq!(binding.path(), RenderPath::Native);
        assert_eq!(binding.terrain().layers.len(), 1);
        assert_eq!(binding.terrain().weights, original_weights);
    }

    #[test]
    fn optimize_is_skipped_on_native_path() {
        let profile = profile_with_layer();
        let mut binding = TerrainSurfaceBinding::new(terrain());
        assert!(!binding.optimize_for_runtime(&profile));
        assert!(binding.has_weight_backup());
        assert_eq!(binding.terrain().flushes, 0);
    }

    #[test]
    fn replace_albedo_is_range_checked() {
        let mut binding = TerrainSurfaceBinding::new(FakeTerrain::new(
            "tile",
            vec![PaintLayer {
                albedo: None,
                normal: None,
                tile_size: [15.0, 15.0],
            }],
        ));
        let rock = image_ref("rock", 50);

        binding
            .replace_albedo(0, Some(rock.clone()), Some(Tiling { near: 30.0, far: 3.0 }))
            .unwrap();
        assert_eq!(binding.terrain().layers[0].tile_size, [30.0, 30.0]);
        assert_eq!(binding.terrain().flushes, 1);
        assert!(matches!(
            binding.replace_normal(4, Some(rock), None),
            Err(SyncError::LayerOutOfRange { index: 4, len: 1, .. })
        ));
    }

    fn bound_image<'a>(binding: &'a TerrainSurfaceBinding<FakeTerrain>, name: &str) -> Option<&'a ImageRef> {
        binding.material()?.texture(name).flatten()?.as_image()
    }

    #[test]
    fn forced_pull_rebuilds_a_clean_profile() {
        let mut profile = profile_with_layer();
        let mut binding = TerrainSurfaceBinding::new(terrain());
        binding.attach_profile(&mut profile).unwrap();
        assert!(!profile.needs_any_rebuild());
        let before = profile.albedo_array().unwrap().clone();

        let outcome = binding.update_profile_from_terrain_forced(&mut profile);
        assert_eq!(outcome.changed, ChangedFlags::BOTH);
        assert_eq!(outcome.appended + outcome.truncated + outcome.updated, 0);
        assert!(!profile.needs_any_rebuild());

        let after = profile.albedo_array().unwrap();
        assert!(!crate::Rc::ptr_eq(&before, after));
        let bound = binding
            .material()
            .unwrap()
            .texture(names::ALBEDO_ARRAY)
            .flatten()
            .and_then(|t| t.as_array())
            .unwrap();
        assert!(crate::Rc::ptr_eq(bound, after));
    }

    #[test]
    fn color_map_blends_layer_averages_by_weight() {
        let mut profile = profile_with_layer();
        let mut binding = TerrainSurfaceBinding::new(terrain());
        binding.attach_profile(&mut profile).unwrap();

        let map = binding.bake_color_map(&profile).unwrap();
        assert_eq!(map.dimensions(), (2, 2));
        let Rgba([r, g, b, a]) = *map.get_pixel(1, 1);
        assert!(r.abs_diff(90) <= 2, "red was {r}");
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(a, 255);

        // Stripped hosts bake from the weight backup.
        assert!(binding.optimize_for_runtime(&profile));
        assert!(binding.terrain().weights.is_empty());
        assert_eq!(binding.bake_color_map(&profile), Some(map));

        let bare = TerrainSurfaceBinding::new(FakeTerrain::new("bare", Vec::new()));
        assert!(bare.bake_color_map(&profile).is_none());
    }

    #[test]
    fn baked_normal_map_packs_heightmap_normals_and_is_bound() {
        let mut host = terrain();
        host.heightmap = (2, 2);
        host.normals = vec![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]];
        let mut binding = TerrainSurfaceBinding::new(host);

        let map = binding.bake_normal_map().unwrap();
        assert_eq!(map.dimensions(), (4, 4));
        assert_eq!(map.color_space(), crate::texture::ColorSpace::Linear);
        assert_eq!(map.sampler().wrap, WrapMode::Clamp);
        let base = map.base();
        assert_eq!(*base.get_pixel(0, 0), Rgba([0, 255, 0, 128]));
        assert_eq!(*base.get_pixel(3, 0), Rgba([0, 128, 0, 255]));
        assert_eq!(*base.get_pixel(0, 3), Rgba([0, 128, 0, 0]));
        assert_eq!(*base.get_pixel(2, 2), Rgba([0, 0, 0, 128]));

        let mut profile = profile_with_layer();
        binding.attach_profile(&mut profile).unwrap();
        let bound = bound_image(&binding, names::GLOBAL_NORMAL_MAP).unwrap();
        assert!(crate::Rc::ptr_eq(bound, &map));
    }

    #[test]
    fn hosts_without_a_heightmap_bake_no_normal_map() {
        let mut binding = TerrainSurfaceBinding::new(terrain());
        assert!(binding.bake_normal_map().is_none());
        assert!(binding.normal_map().is_none());
    }
}
