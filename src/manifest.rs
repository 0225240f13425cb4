//! JSON descriptions of a profile for offline baking.
//!
//! Image paths are resolved relative to a base directory (normally the
//! manifest's own directory) and decoded through a caller-supplied loader, so
//! callers can decode up front in parallel and hand out cached images.

use std::path::Path;
use std::path::PathBuf;

use itertools::Itertools;
use rootcause::Report;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing::info;

use crate::profile::DetailNormalParams;
use crate::profile::GeologicalParams;
use crate::profile::GlobalSlot;
use crate::profile::LayerDescriptor;
use crate::profile::LayerInputs;
use crate::profile::LayerParams;
use crate::profile::Profile;
use crate::profile::ProfileSettings;
use crate::profile::RegistryError;
use crate::profile::SnowParams;
use crate::profile::Tiling;
use crate::texture::ColorSpace;
use crate::texture::ImageRef;
use crate::texture::Texture;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("manifest parse error: {0}")]
    Json(String),
    #[error("image decode error: {0}")]
    Image(String),
    #[error("image was not loaded")]
    MissingImage,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerEntry {
    pub name: String,
    pub albedo: Option<PathBuf>,
    pub normal: Option<PathBuf>,
    pub height: Option<PathBuf>,
    pub ambient_occlusion: Option<PathBuf>,
    pub smoothness: Option<PathBuf>,
    pub roughness: Option<PathBuf>,
    pub tiling: Tiling,
    pub params: LayerParams,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowEntry {
    pub albedo: Option<PathBuf>,
    pub normal: Option<PathBuf>,
    pub height: Option<PathBuf>,
    pub ambient_occlusion: Option<PathBuf>,
    pub noise: Option<PathBuf>,
    pub params: SnowParams,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailNormalEntry {
    pub image: Option<PathBuf>,
    pub params: DetailNormalParams,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeologicalEntry {
    pub albedo: Option<PathBuf>,
    pub params: GeologicalParams,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub name: String,
    pub settings: ProfileSettings,
    pub layers: Vec<LayerEntry>,
    pub snow: Option<SnowEntry>,
    pub detail_normal: Option<DetailNormalEntry>,
    pub geological: Option<GeologicalEntry>,
}

/// Decodes one image from disk, tagged with `color_space`.
pub fn load_image(path: &Path, color_space: ColorSpace) -> Result<ImageRef, Report<ManifestError>> {
    let image = image::open(path).map_err(|e| {
        Report::new(ManifestError::Image(e.to_string())).attach(format!("path: {}", path.display()))
    })?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!(?path, ?color_space, "decoded image");
    Ok(Texture::new(name, image.to_rgba8())
        .with_color_space(color_space)
        .into_shared())
}

impl Manifest {
    /// Parses a manifest file. An empty `name` is replaced with the file
    /// stem.
    pub fn load(path: &Path) -> Result<Self, Report<ManifestError>> {
        let data = std::fs::read(path).map_err(|e| {
            Report::new(ManifestError::Io(e.to_string())).attach(format!("path: {}", path.display()))
        })?;
        let mut manifest: Manifest = serde_json::from_slice(&data).map_err(|e| {
            Report::new(ManifestError::Json(e.to_string())).attach(format!("path: {}", path.display()))
        })?;
        if manifest.name.is_empty() {
            manifest.name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        info!(manifest = %manifest.name, layers = manifest.layers.len(), "loaded manifest");
        Ok(manifest)
    }

    fn referenced(&self) -> impl Iterator<Item = (&PathBuf, ColorSpace)> {
        let layers = self.layers.iter().flat_map(|layer| {
            [
                (&layer.albedo, ColorSpace::Srgb),
                (&layer.normal, ColorSpace::Linear),
                (&layer.height, ColorSpace::Linear),
                (&layer.ambient_occlusion, ColorSpace::Linear),
                (&layer.smoothness, ColorSpace::Linear),
                (&layer.roughness, ColorSpace::Linear),
            ]
        });
        let snow = self.snow.iter().flat_map(|snow| {
            [
                (&snow.albedo, ColorSpace::Srgb),
                (&snow.normal, ColorSpace::Linear),
                (&snow.height, ColorSpace::Linear),
                (&snow.ambient_occlusion, ColorSpace::Linear),
                (&snow.noise, ColorSpace::Linear),
            ]
        });
        let detail = self
            .detail_normal
            .iter()
            .map(|detail| (&detail.image, ColorSpace::Linear));
        let geological = self
            .geological
            .iter()
            .map(|geological| (&geological.albedo, ColorSpace::Srgb));

        layers
            .chain(snow)
            .chain(detail)
            .chain(geological)
            .filter_map(|(path, color_space)| path.as_ref().map(|path| (path, color_space)))
    }

    /// Every distinct image the manifest references, resolved against `base`,
    /// with the colour space it will be decoded in.
    pub fn image_paths(&self, base: &Path) -> Vec<(PathBuf, ColorSpace)> {
        self.referenced()
            .map(|(path, color_space)| (base.join(path), color_space))
            .unique()
            .collect()
    }

    /// Builds a profile, decoding every referenced image through `loader`.
    /// Layers are added in manifest order.
    pub fn into_profile(
        self,
        base: &Path,
        mut loader: impl FnMut(&Path, ColorSpace) -> Result<ImageRef, Report<ManifestError>>,
    ) -> Result<Profile, Report<ManifestError>> {
        let mut load = |path: &Option<PathBuf>, color_space: ColorSpace| -> Result<Option<ImageRef>, Report<ManifestError>> {
            path.as_ref()
                .map(|path| loader(&base.join(path), color_space))
                .transpose()
        };

        let mut profile = Profile::new(self.name, self.settings);
        for entry in &self.layers {
            let inputs = LayerInputs {
                albedo: load(&entry.albedo, ColorSpace::Srgb)?,
                normal: load(&entry.normal, ColorSpace::Linear)?,
                height: load(&entry.height, ColorSpace::Linear)?,
                ambient_occlusion: load(&entry.ambient_occlusion, ColorSpace::Linear)?,
                smoothness: load(&entry.smoothness, ColorSpace::Linear)?,
                roughness: load(&entry.roughness, ColorSpace::Linear)?,
            };
            let layer = LayerDescriptor::new(entry.name.clone(), inputs)
                .with_tiling(entry.tiling)
                .with_params(entry.params.clone());
            profile
                .add_layer(layer)
                .map_err(|e| Report::new(ManifestError::from(e)).attach(format!("layer: {}", entry.name)))?;
        }

        if let Some(snow) = &self.snow {
            let slots = [
                (GlobalSlot::SnowAlbedo, &snow.albedo, ColorSpace::Srgb),
                (GlobalSlot::SnowNormal, &snow.normal, ColorSpace::Linear),
                (GlobalSlot::SnowHeight, &snow.height, ColorSpace::Linear),
                (GlobalSlot::SnowAmbientOcclusion, &snow.ambient_occlusion, ColorSpace::Linear),
                (GlobalSlot::SnowNoise, &snow.noise, ColorSpace::Linear),
            ];
            for (slot, path, color_space) in slots {
                let image = load(path, color_space)?;
                profile.set_global_input(slot, image);
            }
            profile.registry_mut().globals_mut().snow.params = snow.params.clone();
        }
        if let Some(detail) = &self.detail_normal {
            let image = load(&detail.image, ColorSpace::Linear)?;
            profile.set_global_input(GlobalSlot::DetailNormal, image);
            profile.registry_mut().globals_mut().detail_normal.params = detail.params.clone();
        }
        if let Some(geological) = &self.geological {
            let image = load(&geological.albedo, ColorSpace::Srgb)?;
            profile.set_global_input(GlobalSlot::GeologicalAlbedo, image);
            profile.registry_mut().globals_mut().geological.params = geological.params.clone();
        }

        Ok(profile)
    }
}
