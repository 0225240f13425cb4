//! Walks a registry in slice order, packs every slice a class needs and
//! records where each layer's data will land. Nothing is written back to the
//! registry here; the caller applies an assignment only once the array has
//! been built.

use tracing::debug;

use super::HeightBounds;
use super::SliceSpec;
use super::pack_albedo_smoothness;
use super::pack_height_ao;
use super::pack_normal;
use crate::profile::InputSlot;
use crate::profile::LayerRegistry;
use crate::profile::ProfileSettings;
use crate::texture::ArrayClass;
use crate::texture::ImageRef;
use crate::texture::Texture;
use crate::texture::color::average_color;

/// Reported once per slice source and once more just before the array is
/// assembled (`completed == total`).
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub class: ArrayClass,
    pub completed: usize,
    pub total: usize,
    pub item: &'a str,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LayerAlbedoSlots {
    pub(crate) albedo_index: Option<u32>,
    pub(crate) height_ao_index: Option<u32>,
    pub(crate) average: [f32; 4],
    pub(crate) height: HeightBounds,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SnowAlbedoSlots {
    pub(crate) albedo_index: Option<u32>,
    pub(crate) height_ao_index: Option<u32>,
    pub(crate) noise_index: Option<u32>,
    pub(crate) average: [f32; 4],
    pub(crate) height: HeightBounds,
}

/// Albedo-class slice positions for every layer and the snow globals.
#[derive(Debug, Clone, Default)]
pub struct AlbedoAssignment {
    pub(crate) layers: Vec<LayerAlbedoSlots>,
    pub(crate) snow: SnowAlbedoSlots,
}

/// Normal-class slice positions.
#[derive(Debug, Clone, Default)]
pub struct NormalAssignment {
    pub(crate) layers: Vec<Option<u32>>,
    pub(crate) snow_normal: Option<u32>,
    pub(crate) detail_normal: Option<u32>,
}

fn texture(image: Option<&ImageRef>) -> Option<&Texture> {
    image.map(|image| &**image)
}

fn place(slices: &mut Vec<Texture>, slice: Texture) -> Option<u32> {
    let index = slices.len() as u32;
    debug!(index, name = slice.name(), "baked slice");
    slices.push(slice);
    Some(index)
}

/// Albedo slice order: for each layer its albedo then (if the shader samples
/// them) its height/AO slice, then snow albedo, snow height/AO, snow noise.
pub fn collect_albedo_slices(
    registry: &LayerRegistry,
    settings: &ProfileSettings,
    progress: &mut dyn FnMut(Progress<'_>),
) -> (Vec<Texture>, AlbedoAssignment) {
    let class = ArrayClass::Albedo;
    let spec = SliceSpec::for_class(class, settings);
    let with_hao = settings.shader_type().samples_height_ao();
    let total = registry.len() + 3;

    let mut slices = Vec::new();
    let mut assignment = AlbedoAssignment::default();

    for (i, layer) in registry.layers().iter().enumerate() {
        progress(Progress {
            class,
            completed: i,
            total,
            item: layer.name(),
        });

        let mut slots = LayerAlbedoSlots::default();
        if let Some(albedo) = texture(layer.input(InputSlot::Albedo)) {
            let smoothness = texture(layer.input(InputSlot::Smoothness));
            let roughness = texture(layer.input(InputSlot::Roughness));
            let slice = if smoothness.is_none() && roughness.is_none() {
                spec.passthrough(albedo)
            } else {
                pack_albedo_smoothness(layer.name(), albedo, smoothness, roughness, &spec)
            };
            slots.average = average_color(&slice);
            slots.albedo_index = place(&mut slices, slice);

            let height = texture(layer.input(InputSlot::Height));
            let ao = texture(layer.input(InputSlot::AmbientOcclusion));
            if with_hao && (height.is_some() || ao.is_some()) {
                let name = format!("{}_hao", layer.name());
                let (packed, bounds) = pack_height_ao(&name, height, ao, &spec);
                slots.height = bounds;
                slots.height_ao_index = place(&mut slices, packed);
            }
        }
        assignment.layers.push(slots);
    }

    let snow = registry.globals().snow.inputs();
    progress(Progress {
        class,
        completed: registry.len(),
        total,
        item: "snow",
    });
    if let Some(albedo) = texture(snow.albedo.as_ref()) {
        let slice = spec.passthrough(albedo);
        assignment.snow.average = average_color(&slice);
        assignment.snow.albedo_index = place(&mut slices, slice);
    }

    let height = texture(snow.height.as_ref());
    let ao = texture(snow.ambient_occlusion.as_ref());
    if with_hao && (height.is_some() || ao.is_some()) {
        let (packed, bounds) = pack_height_ao("snow_hao", height, ao, &spec);
        assignment.snow.height = bounds;
        assignment.snow.height_ao_index = place(&mut slices, packed);
    }

    progress(Progress {
        class,
        completed: registry.len() + 1,
        total,
        item: "snow noise",
    });
    if let Some(noise) = texture(snow.noise.as_ref()) {
        let (packed, _) = pack_height_ao("snow_noise", None, Some(noise), &spec);
        assignment.snow.noise_index = place(&mut slices, packed);
    }

    progress(Progress {
        class,
        completed: total,
        total,
        item: "albedo array",
    });
    (slices, assignment)
}

/// Normal slice order: each layer's normal, snow normal, detail normal.
pub fn collect_normal_slices(
    registry: &LayerRegistry,
    settings: &ProfileSettings,
    progress: &mut dyn FnMut(Progress<'_>),
) -> (Vec<Texture>, NormalAssignment) {
    let class = ArrayClass::Normal;
    let spec = SliceSpec::for_class(class, settings);
    let total = registry.len() + 2;

    let mut slices = Vec::new();
    let mut assignment = NormalAssignment::default();

    for (i, layer) in registry.layers().iter().enumerate() {
        progress(Progress {
            class,
            completed: i,
            total,
            item: layer.name(),
        });
        let index = pack_normal(layer.name(), texture(layer.input(InputSlot::Normal)), &spec)
            .and_then(|packed| place(&mut slices, packed));
        assignment.layers.push(index);
    }

    let globals = registry.globals();
    progress(Progress {
        class,
        completed: registry.len(),
        total,
        item: "snow normal",
    });
    assignment.snow_normal = pack_normal("snow_normal", texture(globals.snow.inputs().normal.as_ref()), &spec)
        .and_then(|packed| place(&mut slices, packed));

    progress(Progress {
        class,
        completed: registry.len() + 1,
        total,
        item: "detail normal",
    });
    assignment.detail_normal = pack_normal("detail_normal", texture(globals.detail_normal.image()), &spec)
        .and_then(|packed| place(&mut slices, packed));

    progress(Progress {
        class,
        completed: total,
        total,
        item: "normal array",
    });
    (slices, assignment)
}
