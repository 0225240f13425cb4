//! Two-way reconciliation between a profile's layer registry and a host
//! terrain's native paint-layer list.

use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::HostTerrain;
use super::PaintLayer;
use crate::profile::ChangedFlags;
use crate::profile::InputSlot;
use crate::profile::LayerDescriptor;
use crate::profile::LayerInputs;
use crate::profile::LayerRegistry;
use crate::profile::MAX_PAINT_LAYERS;
use crate::profile::Profile;
use crate::profile::RegistryError;
use crate::profile::Tiling;
use crate::texture::ImageRef;
use crate::texture::is_different;

/// Native albedos exactly this wide are treated as authoring placeholders.
///
/// This is a size heuristic, not a guarantee: a real 64px texture is
/// indistinguishable from filler.
pub const PLACEHOLDER_WIDTH: u32 = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("cannot push an empty registry onto terrain {terrain}")]
    EmptyRegistry { terrain: String },
    #[error("terrain {terrain} is gone")]
    TerrainGone { terrain: String },
    #[error("paint layer {index} does not exist on terrain {terrain} ({len} layers)")]
    LayerOutOfRange {
        terrain: String,
        index: usize,
        len: usize,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub fn is_placeholder(image: &ImageRef) -> bool {
    image.width() == PLACEHOLDER_WIDTH
}

/// First point at which the registry and the native list disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    Count { registry: usize, native: usize },
    Albedo(usize),
    Normal(usize),
    Tiling(usize),
}

impl Divergence {
    /// Count or identity mismatches, as opposed to a tiling-only difference.
    pub fn is_structural(self) -> bool {
        !matches!(self, Divergence::Tiling(_))
    }
}

/// Compares counts, then albedo/normal identity and near tiling per slot.
pub fn divergence(registry: &LayerRegistry, native: &[PaintLayer]) -> Option<Divergence> {
    if registry.len() != native.len() {
        return Some(Divergence::Count {
            registry: registry.len(),
            native: native.len(),
        });
    }

    registry.layers().iter().zip(native).enumerate().find_map(|(i, (layer, paint))| {
        let albedo = layer.input(InputSlot::Albedo);
        if is_different(albedo, paint.albedo.as_ref()) {
            Some(Divergence::Albedo(i))
        } else if albedo.is_some() && layer.tiling().near != paint.tile_size[0] {
            Some(Divergence::Tiling(i))
        } else if is_different(layer.input(InputSlot::Normal), paint.normal.as_ref()) {
            Some(Divergence::Normal(i))
        } else {
            None
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PullOutcome {
    pub appended: usize,
    pub truncated: usize,
    pub updated: usize,
    pub placeholders_skipped: usize,
    pub changed: ChangedFlags,
}

/// Terrain to registry.
///
/// Excess registry layers are dropped, extra native layers appended (up to
/// the layer ceiling), and existing slots take the native albedo/normal
/// unless the native albedo looks like a placeholder and the registry
/// already holds something else. `force` marks both classes dirty.
pub fn pull<T: HostTerrain + ?Sized>(profile: &mut Profile, terrain: &T, force: bool) -> PullOutcome {
    let native = terrain.paint_layers();
    let mut outcome = PullOutcome::default();
    if force {
        profile.force_update();
        outcome.changed = ChangedFlags::BOTH;
    }

    let before = profile.registry().len();
    if before > native.len() {
        outcome.changed |= profile.truncate_layers(native.len());
        outcome.truncated = before - native.len();
    }

    for (index, paint) in native.iter().enumerate() {
        if index < profile.registry().len() {
            let current = profile.registry().layers()[index].input(InputSlot::Albedo).cloned();
            if let Some(albedo) = &paint.albedo {
                if is_placeholder(albedo) && is_different(current.as_ref(), Some(albedo)) {
                    warn!(
                        terrain = terrain.name(),
                        layer = index,
                        "native albedo looks like a placeholder, keeping registry texture"
                    );
                    outcome.placeholders_skipped += 1;
                    continue;
                }
            }

            let changed = set_pair(profile, index, paint);
            if changed.any() {
                outcome.updated += 1;
                outcome.changed |= changed;
            }
            continue;
        }

        let name = paint
            .albedo
            .as_ref()
            .map(|albedo| albedo.name().to_string())
            .unwrap_or_else(|| format!("layer{index}"));
        let layer = LayerDescriptor::new(
            name,
            LayerInputs {
                albedo: paint.albedo.clone(),
                normal: paint.normal.clone(),
                ..Default::default()
            },
        )
        .with_tiling(Tiling {
            near: paint.tile_size[0],
            ..Tiling::default()
        });

        match profile.add_layer(layer) {
            Ok(changed) => {
                outcome.appended += 1;
                outcome.changed |= changed;
            }
            Err(err) => {
                warn!(terrain = terrain.name(), %err, "ignoring native paint layers past the ceiling");
                break;
            }
        }
    }

    debug!(terrain = terrain.name(), ?outcome, "pulled paint layers");
    outcome
}

fn set_pair(profile: &mut Profile, index: usize, paint: &PaintLayer) -> ChangedFlags {
    let mut changed = ChangedFlags::NONE;
    // Index is in range: the caller iterates existing layers only.
    if let Ok(flags) = profile.set_layer_albedo(index, paint.albedo.clone()) {
        changed |= flags;
    }
    if let Ok(flags) = profile.set_layer_normal(index, paint.normal.clone()) {
        changed |= flags;
    }
    changed
}

/// Registry to terrain. Writes every layer's albedo, normal and near tiling
/// as the native list and flushes the host. Returns the layer count written.
pub fn push<T: HostTerrain + ?Sized>(profile: &Profile, terrain: &mut T) -> Result<usize, SyncError> {
    if !terrain.is_alive() {
        return Err(SyncError::TerrainGone {
            terrain: terrain.name().to_string(),
        });
    }
    let registry = profile.registry();
    if registry.is_empty() {
        warn!(terrain = terrain.name(), "refusing to push an empty registry");
        return Err(SyncError::EmptyRegistry {
            terrain: terrain.name().to_string(),
        });
    }

    let layers: Vec<_> = registry
        .layers()
        .iter()
        .take(MAX_PAINT_LAYERS)
        .map(|layer| PaintLayer {
            albedo: layer.input(InputSlot::Albedo).cloned(),
            normal: layer.input(InputSlot::Normal).cloned(),
            tile_size: [layer.tiling().near, layer.tiling().near],
        })
        .collect();
    let count = layers.len();
    terrain.set_paint_layers(layers);
    terrain.flush();
    info!(terrain = terrain.name(), layers = count, "pushed paint layers");
    Ok(count)
}

/// Why a reconciliation is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// A profile is being attached to a terrain; the profile is authoritative.
    Attach,
    /// The terrain may have been edited natively; the terrain is
    /// authoritative.
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    InSync,
    Pulled(PullOutcome),
    Pushed(usize),
}

/// Runs exactly one direction.
///
/// An empty registry always pulls. Otherwise, on attach any divergence is
/// resolved by pushing; on refresh a structural divergence is resolved by
/// pulling and a tiling-only difference by pushing.
pub fn reconcile<T: HostTerrain + ?Sized>(
    profile: &mut Profile,
    terrain: &mut T,
    mode: SyncMode,
) -> Result<SyncAction, SyncError> {
    if !terrain.is_alive() {
        warn!(terrain = terrain.name(), "cannot reconcile a destroyed terrain");
        return Err(SyncError::TerrainGone {
            terrain: terrain.name().to_string(),
        });
    }

    if profile.registry().is_empty() {
        return Ok(SyncAction::Pulled(pull(profile, terrain, false)));
    }

    let Some(diverged) = divergence(profile.registry(), &terrain.paint_layers()) else {
        return Ok(SyncAction::InSync);
    };
    debug!(terrain = terrain.name(), ?diverged, ?mode, "terrain diverged from registry");

    match mode {
        SyncMode::Refresh if diverged.is_structural() => {
            Ok(SyncAction::Pulled(pull(profile, terrain, false)))
        }
        _ => push(profile, terrain).map(SyncAction::Pushed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileSettings;
    use crate::surface::testing::FakeTerrain;
    use crate::texture::ArrayClass;
    use crate::texture::Texture;
    use image::RgbaImage;

    fn image(name: &str, size: u32) -> ImageRef {
        Texture::new(name, RgbaImage::new(size, size)).into_shared()
    }

    fn paint(albedo: &ImageRef, normal: Option<&ImageRef>, tile: f32) -> PaintLayer {
        PaintLayer {
            albedo: Some(albedo.clone()),
            normal: normal.cloned(),
            tile_size: [tile, tile],
        }
    }

    #[test]
    fn pull_into_empty_registry_appends_everything() {
        let grass = image("grass", 256);
        let rock = image("rock", 256);
        let rock_n = image("rock_n", 256);
        let terrain = FakeTerrain::new("t", vec![paint(&grass, None, 10.0), paint(&rock, Some(&rock_n), 22.0)]);
        let mut profile = Profile::new("p", ProfileSettings::default());

        let outcome = pull(&mut profile, &terrain, false);
        assert_eq!(outcome.appended, 2);
        assert_eq!(outcome.changed, ChangedFlags::BOTH);

        let layers = profile.registry().layers();
        assert_eq!(layers[1].name(), "rock");
        assert_eq!(layers[1].tiling().near, 22.0);
        assert!(!is_different(layers[1].input(InputSlot::Normal), Some(&rock_n)));
        assert!(divergence(profile.registry(), &terrain.layers).is_none());
    }

    #[test]
    fn pull_never_overwrites_with_placeholder() {
        let authored = image("authored", 512);
        let placeholder = image("placeholder", PLACEHOLDER_WIDTH);
        let mut profile = Profile::new("p", ProfileSettings::default());
        profile
            .add_layer(LayerDescriptor::new(
                "authored",
                LayerInputs {
                    albedo: Some(authored.clone()),
                    ..Default::default()
                },
            ))
            .unwrap();
        let terrain = FakeTerrain::new("t", vec![paint(&placeholder, None, 15.0)]);

        let outcome = pull(&mut profile, &terrain, false);
        assert_eq!(outcome.placeholders_skipped, 1);
        assert_eq!(outcome.updated, 0);
        let current = profile.registry().layers()[0].input(InputSlot::Albedo);
        assert!(!is_different(current, Some(&authored)));

        let real = image("real", 128);
        let terrain = FakeTerrain::new("t", vec![paint(&real, None, 15.0)]);
        let outcome = pull(&mut profile, &terrain, false);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.changed, ChangedFlags::only(ArrayClass::Albedo));
    }

    #[test]
    fn pull_truncates_excess_layers() {
        let a = image("a", 128);
        let settings = ProfileSettings::builder()
            .albedo_size(crate::texture::TextureSize::Size64)
            .build();
        let mut profile = Profile::new("p", settings);
        for name in ["a", "b", "c"] {
            profile
                .add_layer(LayerDescriptor::new(
                    name,
                    LayerInputs {
                        albedo: Some(a.clone()),
                        ..Default::default()
                    },
                ))
                .unwrap();
        }
        profile.rebuild(None);

        let terrain = FakeTerrain::new("t", vec![paint(&a, None, 15.0)]);
        let outcome = pull(&mut profile, &terrain, false);
        assert_eq!(outcome.truncated, 2);
        assert_eq!(profile.registry().len(), 1);
        assert!(profile.needs_rebuild(ArrayClass::Albedo));
        assert!(profile.needs_rebuild(ArrayClass::Normal));
    }

    #[test]
    fn attach_pushes_and_refresh_pulls() {
        let a = image("a", 128);
        let b = image("b", 128);
        let mut profile = Profile::new("p", ProfileSettings::default());
        profile
            .add_layer(LayerDescriptor::new(
                "a",
                LayerInputs {
                    albedo: Some(a.clone()),
                    ..Default::default()
                },
            ))
            .unwrap();

        let mut terrain = FakeTerrain::new("t", Vec::new());
        let action = reconcile(&mut profile, &mut terrain, SyncMode::Attach).unwrap();
        assert_eq!(action, SyncAction::Pushed(1));
        assert_eq!(terrain.flushes, 1);
        assert_eq!(terrain.layers[0].tile_size, [15.0, 15.0]);
        assert_eq!(
            reconcile(&mut profile, &mut terrain, SyncMode::Attach).unwrap(),
            SyncAction::InSync
        );

        terrain.layers.push(paint(&b, None, 5.0));
        let action = reconcile(&mut profile, &mut terrain, SyncMode::Refresh).unwrap();
        assert!(matches!(action, SyncAction::Pulled(PullOutcome { appended: 1, .. })));
        assert_eq!(profile.registry().len(), 2);

        terrain.layers[0].tile_size = [3.0, 3.0];
        let action = reconcile(&mut profile, &mut terrain, SyncMode::Refresh).unwrap();
        assert_eq!(action, SyncAction::Pushed(2));
        assert_eq!(terrain.layers[0].tile_size, [15.0, 15.0]);
    }

    #[test]
    fn push_refuses_empty_registry() {
        let profile = Profile::new("p", ProfileSettings::default());
        let mut terrain = FakeTerrain::new("t", Vec::new());
        assert!(matches!(
            push(&profile, &mut terrain),
            Err(SyncError::EmptyRegistry { .. })
        ));
        assert_eq!(terrain.flushes, 0);
    }
}
