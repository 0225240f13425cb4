//! Everything between a built profile and a host terrain: the host adapter
//! trait, two-way paint-layer reconciliation, shader parameter binding and
//! the per-terrain binding that falls back to the host's native path.

mod basemap;
mod binder;
mod binding;
mod sync;

pub use basemap::bake_color_map;
pub use basemap::bake_normal_map;
pub use binder::BindError;
pub use binder::MaterialParams;
pub use binder::ParamSet;
pub use binder::ParamValue;
pub use binder::SurfaceMaps;
pub use binder::TextureBinding;
pub use binder::bind;
pub use binder::names;
pub use binding::RenderPath;
pub use binding::TerrainSurfaceBinding;
pub use sync::Divergence;
pub use sync::PLACEHOLDER_WIDTH;
pub use sync::PullOutcome;
pub use sync::SyncAction;
pub use sync::SyncError;
pub use sync::SyncMode;
pub use sync::divergence;
pub use sync::is_placeholder;
pub use sync::pull;
pub use sync::push;
pub use sync::reconcile;

use crate::texture::ImageRef;

/// One entry of the host's native paint-layer list.
#[derive(Debug, Clone, Default)]
pub struct PaintLayer {
    pub albedo: Option<ImageRef>,
    pub normal: Option<ImageRef>,
    pub tile_size: [f32; 2],
}

/// Per-pixel paint weights, `layers` values per pixel, row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightData {
    pub width: u32,
    pub height: u32,
    pub layers: usize,
    pub weights: Vec<f32>,
}

impl WeightData {
    pub fn new(width: u32, height: u32, layers: usize) -> Self {
        Self {
            width,
            height,
            layers,
            weights: vec![0.0; width as usize * height as usize * layers],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    fn offset(&self, x: u32, y: u32, layer: usize) -> Option<usize> {
        if x >= self.width || y >= self.height || layer >= self.layers {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * self.layers + layer)
    }

    pub fn weight(&self, x: u32, y: u32, layer: usize) -> f32 {
        self.offset(x, y, layer)
            .and_then(|i| self.weights.get(i).copied())
            .unwrap_or(0.0)
    }

    pub fn set_weight(&mut self, x: u32, y: u32, layer: usize, weight: f32) {
        if let Some(slot) = self.offset(x, y, layer).and_then(|i| self.weights.get_mut(i)) {
            *slot = weight;
        }
    }
}

/// Adapter over the host engine's terrain object.
///
/// Any mutation of the paint-layer list or the weights only becomes visible
/// after [`HostTerrain::flush`].
pub trait HostTerrain {
    fn name(&self) -> &str;

    fn paint_layers(&self) -> Vec<PaintLayer>;

    fn set_paint_layers(&mut self, layers: Vec<PaintLayer>);

    /// The packed weight textures, four paint layers per texture.
    fn weight_maps(&self) -> Vec<ImageRef>;

    fn weights(&self) -> WeightData;

    fn set_weights(&mut self, weights: WeightData);

    fn flush(&mut self);

    /// Heightmap samples per axis. Zero means the host exposes no heightmap.
    fn heightmap_resolution(&self) -> (u32, u32) {
        (0, 0)
    }

    /// Unit surface normal at normalized heightmap coordinates, bilinearly
    /// interpolated between samples.
    fn interpolated_normal(&self, _u: f32, _v: f32) -> [f32; 3] {
        [0.0, 1.0, 0.0]
    }

    /// False once the host object has been destroyed.
    fn is_alive(&self) -> bool {
        true
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// In-memory terrain that counts flushes.
    #[derive(Debug, Clone, Default)]
    pub struct FakeTerrain {
        pub name: String,
        pub layers: Vec<PaintLayer>,
        pub weight_maps: Vec<ImageRef>,
        pub weights: WeightData,
        pub flushes: usize,
        pub alive: bool,
        /// Heightmap resolution and a normal per sample, row-major.
        pub heightmap: (u32, u32),
        pub normals: Vec<[f32; 3]>,
    }

    impl FakeTerrain {
        pub fn new(name: &str, layers: Vec<PaintLayer>) -> Self {
            Self {
                name: name.to_string(),
                layers,
                alive: true,
                ..Default::default()
            }
        }
    }

    impl HostTerrain for FakeTerrain {
        fn name(&self) -> &str {
            &self.name
        }

        fn paint_layers(&self) -> Vec<PaintLayer> {
            self.layers.clone()
        }

        fn set_paint_layers(&mut self, layers: Vec<PaintLayer>) {
            self.layers = layers;
        }

        fn weight_maps(&self) -> Vec<ImageRef> {
            self.weight_maps.clone()
        }

        fn weights(&self) -> WeightData {
            self.weights.clone()
        }

        fn set_weights(&mut self, weights: WeightData) {
            self.weights = weights;
        }

        fn flush(&mut self) {
            self.flushes += 1;
        }

        fn heightmap_resolution(&self) -> (u32, u32) {
            self.heightmap
        }

        // Nearest sample is enough for tests.
        fn interpolated_normal(&self, u: f32, v: f32) -> [f32; 3] {
            let (width, height) = self.heightmap;
            let x = ((u * width as f32) as u32).min(width.saturating_sub(1));
            let y = ((v * height as f32) as u32).min(height.saturating_sub(1));
            self.normals
                .get((y * width + x) as usize)
                .copied()
                .unwrap_or([0.0, 1.0, 0.0])
        }

        fn is_alive(&self) -> bool {
            self.alive
        }
    }
}
