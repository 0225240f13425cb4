use std::collections::BTreeMap;

use thiserror::Error;

use crate::Rc;
use crate::profile::AoType;
use crate::profile::MAX_PAINT_LAYERS;
use crate::profile::Profile;
use crate::profile::ShaderType;
use crate::texture::ArrayClass;
use crate::texture::ImageRef;
use crate::texture::TextureArray;

/// Parameter names understood by the custom terrain shader.
pub mod names {
    pub const ALBEDO_ARRAY: &str = "albedo_array";
    pub const NORMAL_ARRAY: &str = "normal_array";
    pub const GLOBAL_NORMAL_MAP: &str = "global_normal_map";
    pub const GLOBAL_COLOR_MAP: &str = "global_color_map";
    pub const GEOLOGICAL_MAP: &str = "geological_map";
    pub const DETAIL_NORMAL_INDEX: &str = "detail_normal_index";
    pub const SNOW_AMOUNT: &str = "snow_amount";
    pub const SNOW_ALBEDO_INDEX: &str = "snow_albedo_index";
    pub const SNOW_NORMAL_INDEX: &str = "snow_normal_index";
    pub const SNOW_HEIGHT_AO_INDEX: &str = "snow_height_ao_index";
    pub const SNOW_NOISE_INDEX: &str = "snow_noise_index";

    /// Weight map covering paint layers `4 * group .. 4 * group + 4`.
    pub fn weight_map(group: usize) -> String {
        format!("weight_map_{}", group + 1)
    }

    /// Per-layer parameter. Slots are numbered from 1 in the shader.
    pub fn layer(slot: usize, field: &str) -> String {
        format!("layer_{}_{field}", slot + 1)
    }
}

/// Number of weight maps the shader samples.
pub const WEIGHT_MAP_COUNT: usize = MAX_PAINT_LAYERS / 4;

#[derive(Debug, Clone)]
pub enum TextureBinding {
    Array(Rc<TextureArray>),
    Image(ImageRef),
}

impl TextureBinding {
    pub fn as_array(&self) -> Option<&Rc<TextureArray>> {
        match self {
            TextureBinding::Array(array) => Some(array),
            TextureBinding::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageRef> {
        match self {
            TextureBinding::Image(image) => Some(image),
            TextureBinding::Array(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ParamValue {
    Texture(Option<TextureBinding>),
    Float(f32),
    Int(i32),
    Vector([f32; 4]),
}

/// String-keyed setter interface of a host material.
pub trait MaterialParams {
    fn set_texture(&mut self, name: &str, texture: Option<TextureBinding>);

    fn set_float(&mut self, name: &str, value: f32);

    fn set_int(&mut self, name: &str, value: i32);

    fn set_vector(&mut self, name: &str, value: [f32; 4]);

    /// Whether the material exposes `name`. Defaults to yes for hosts that
    /// cannot introspect.
    fn has_param(&self, _name: &str) -> bool {
        true
    }
}

/// A flat, ordered parameter set. Also the generated material a binding
/// owns; hosts copy it out with [`ParamSet::apply_to`].
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParamSet {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            ParamValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            ParamValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn vector(&self, name: &str) -> Option<[f32; 4]> {
        match self.get(name)? {
            ParamValue::Vector(value) => Some(*value),
            _ => None,
        }
    }

    /// `Some(None)` when the parameter was explicitly cleared.
    pub fn texture(&self, name: &str) -> Option<Option<&TextureBinding>> {
        match self.get(name)? {
            ParamValue::Texture(value) => Some(value.as_ref()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn apply_to(&self, out: &mut dyn MaterialParams) {
        for (name, value) in self.iter() {
            match value {
                ParamValue::Texture(texture) => out.set_texture(name, texture.clone()),
                ParamValue::Float(value) => out.set_float(name, *value),
                ParamValue::Int(value) => out.set_int(name, *value),
                ParamValue::Vector(value) => out.set_vector(name, *value),
            }
        }
    }
}

impl MaterialParams for ParamSet {
    fn set_texture(&mut self, name: &str, texture: Option<TextureBinding>) {
        self.values.insert(name.to_string(), ParamValue::Texture(texture));
    }

    fn set_float(&mut self, name: &str, value: f32) {
        self.values.insert(name.to_string(), ParamValue::Float(value));
    }

    fn set_int(&mut self, name: &str, value: i32) {
        self.values.insert(name.to_string(), ParamValue::Int(value));
    }

    fn set_vector(&mut self, name: &str, value: [f32; 4]) {
        self.values.insert(name.to_string(), ParamValue::Vector(value));
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("profile uses the native shader")]
    NativeShader,
    #[error("no {0} array has been built")]
    MissingArray(ArrayClass),
    #[error("terrain has no weight maps")]
    MissingWeightMaps,
    #[error("material does not expose the terrain array parameters")]
    UnsupportedMaterial,
}

/// Per-terrain inputs that live outside the profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurfaceMaps<'a> {
    pub weight_maps: &'a [ImageRef],
    pub normal_map: Option<&'a ImageRef>,
    pub color_map: Option<&'a ImageRef>,
}

fn slot(index: Option<u32>) -> i32 {
    index.map_or(-1, |index| index as i32)
}

fn image(image: Option<&ImageRef>) -> Option<TextureBinding> {
    image.cloned().map(TextureBinding::Image)
}

/// Writes the full custom-shader parameter set for `profile` into `out`.
///
/// Nothing is written unless both arrays exist, the terrain has weight maps
/// and the material exposes the array slots; the caller should then use the
/// host's native path instead.
pub fn bind(profile: &Profile, maps: &SurfaceMaps<'_>, out: &mut dyn MaterialParams) -> Result<(), BindError> {
    if profile.settings().shader_type() == ShaderType::Native {
        return Err(BindError::NativeShader);
    }
    let albedo = profile
        .albedo_array()
        .ok_or(BindError::MissingArray(ArrayClass::Albedo))?;
    let normal = profile
        .normal_array()
        .ok_or(BindError::MissingArray(ArrayClass::Normal))?;
    if maps.weight_maps.is_empty() {
        return Err(BindError::MissingWeightMaps);
    }
    if !out.has_param(names::ALBEDO_ARRAY) || !out.has_param(names::NORMAL_ARRAY) {
        return Err(BindError::UnsupportedMaterial);
    }

    out.set_texture(names::ALBEDO_ARRAY, Some(TextureBinding::Array(albedo.clone())));
    out.set_texture(names::NORMAL_ARRAY, Some(TextureBinding::Array(normal.clone())));
    for group in 0..WEIGHT_MAP_COUNT {
        out.set_texture(&names::weight_map(group), image(maps.weight_maps.get(group)));
    }

    bind_shading(profile, out);
    bind_global_maps(profile, maps, out);
    bind_snow(profile, out);
    bind_layers(profile, out);
    Ok(())
}

fn bind_shading(profile: &Profile, out: &mut dyn MaterialParams) {
    let shading = &profile.settings().shading;
    out.set_float("uv_mix_power", shading.uv_mix_power);
    out.set_float("uv_mix_start_distance", shading.uv_mix_start_distance);
    out.set_float("terrain_smoothness", shading.smoothness);
    out.set_float("terrain_specular", shading.specular);
    out.set_float("tessellation_power", shading.tessellation_power);
    out.set_float("tessellation_min_distance", shading.tessellation_min_distance);
    out.set_float("tessellation_max_distance", shading.tessellation_max_distance);
    out.set_float("tessellation_phong", shading.tessellation_phong);
    out.set_int("ao_type", shading.ao_type.shader_value());

    let ao_on = shading.ao_type != AoType::None && shading.ao_power > 0.0;
    out.set_int("use_ao", ao_on as i32);
    out.set_int("use_ao_texture", (ao_on && shading.ao_type == AoType::TextureBased) as i32);
    out.set_float("ao_power", if ao_on { shading.ao_power } else { 0.0 });
}

fn bind_global_maps(profile: &Profile, maps: &SurfaceMaps<'_>, out: &mut dyn MaterialParams) {
    let shading = &profile.settings().shading;
    let globals = profile.registry().globals();

    let detail = &globals.detail_normal;
    out.set_int(
        names::DETAIL_NORMAL_INDEX,
        if detail.params.is_active() { slot(detail.index()) } else { -1 },
    );
    out.set_float("detail_normal_near_power", detail.params.near_power);
    out.set_float("detail_normal_near_tiling", detail.params.near_tiling);
    out.set_float("detail_normal_far_power", detail.params.far_power);
    out.set_float("detail_normal_far_tiling", detail.params.far_tiling);

    match maps.normal_map {
        Some(map) => {
            out.set_float("global_normal_power", shading.global_normal_power);
            let bound = (shading.global_normal_power > 0.0).then_some(map);
            out.set_texture(names::GLOBAL_NORMAL_MAP, image(bound));
        }
        None => {
            out.set_float("global_normal_power", 0.0);
            out.set_texture(names::GLOBAL_NORMAL_MAP, None);
        }
    }

    match maps.color_map {
        Some(map) => {
            out.set_float("color_map_near_power", shading.color_map_near_power);
            out.set_float("color_map_far_power", shading.color_map_far_power);
            let active = shading.color_map_near_power > 0.0 || shading.color_map_far_power > 0.0;
            out.set_texture(names::GLOBAL_COLOR_MAP, image(active.then_some(map)));
        }
        None => {
            out.set_float("color_map_near_power", 0.0);
            out.set_float("color_map_far_power", 0.0);
            out.set_texture(names::GLOBAL_COLOR_MAP, None);
        }
    }

    let geo = &globals.geological;
    match geo.albedo() {
        Some(albedo) if geo.params.is_active() => {
            out.set_float("geological_near_offset", geo.params.near_offset);
            out.set_float("geological_near_power", geo.params.near_power);
            out.set_float("geological_near_tiling", geo.params.near_tiling);
            out.set_float("geological_far_offset", geo.params.far_offset);
            out.set_float("geological_far_power", geo.params.far_power);
            out.set_float("geological_far_tiling", geo.params.far_tiling);
            out.set_texture(names::GEOLOGICAL_MAP, image(Some(albedo)));
        }
        _ => {
            out.set_float("geological_near_power", 0.0);
            out.set_float("geological_far_power", 0.0);
            out.set_texture(names::GEOLOGICAL_MAP, None);
        }
    }
}

fn bind_snow(profile: &Profile, out: &mut dyn MaterialParams) {
    let snow = &profile.registry().globals().snow;
    let params = &snow.params;
    out.set_float(names::SNOW_AMOUNT, params.amount);

    if params.amount <= 0.0 {
        for name in [
            names::SNOW_ALBEDO_INDEX,
            names::SNOW_NORMAL_INDEX,
            names::SNOW_HEIGHT_AO_INDEX,
            names::SNOW_NOISE_INDEX,
        ] {
            out.set_int(name, -1);
        }
        return;
    }

    let baked = snow.baked();
    out.set_int(names::SNOW_ALBEDO_INDEX, slot(baked.albedo_index()));
    out.set_int(names::SNOW_NORMAL_INDEX, slot(baked.normal_index()));
    out.set_int(names::SNOW_HEIGHT_AO_INDEX, slot(baked.height_ao_index()));
    out.set_int(names::SNOW_NOISE_INDEX, slot(baked.noise_index()));

    out.set_float("snow_max_angle", params.max_angle);
    out.set_float("snow_max_angle_hardness", params.max_angle_hardness);
    out.set_float("snow_min_height", params.min_height);
    out.set_float("snow_min_height_blending", params.min_height_blending);
    out.set_float("snow_noise_power", params.noise_power);
    out.set_float("snow_noise_tiling", params.noise_tiling);
    out.set_float("snow_normal_scale", params.normal_scale);
    out.set_float("snow_detail_power", params.detail_power);
    out.set_float("snow_tiling", params.tiling_near);
    out.set_float("snow_tiling_far_multiplier", params.tiling_far);
    out.set_float("snow_brightness", params.brightness);
    out.set_float("snow_blend_normal", params.blend_normal);
    out.set_float("snow_smoothness", params.smoothness);
    out.set_float("snow_specular", params.specular);
    out.set_float("snow_height_blend_near", params.height_blend_near);
    out.set_float("snow_height_blend_far", params.height_blend_far);
    out.set_float("snow_height_contrast", params.height_contrast);
    out.set_float("snow_height_depth", params.height_depth);
    let bounds = baked.height_bounds();
    out.set_float("snow_height_min", bounds.min as f32 / 255.0);
    out.set_float("snow_height_max", bounds.max as f32 / 255.0);
    out.set_float("snow_ao_power", params.ao_strength);
    out.set_float("snow_tessellation_depth", params.tessellation_depth);
    let [r, g, b] = params.tint;
    out.set_vector(
        "snow_color",
        [
            r * params.brightness,
            g * params.brightness,
            b * params.brightness,
            params.smoothness,
        ],
    );
    out.set_vector("snow_average", baked.average());
}

fn bind_layers(profile: &Profile, out: &mut dyn MaterialParams) {
    let layers = profile.registry().layers();
    for index in 0..MAX_PAINT_LAYERS {
        let name = |field: &str| names::layer(index, field);
        let Some(layer) = layers.get(index) else {
            out.set_int(&name("albedo_index"), -1);
            out.set_int(&name("normal_index"), -1);
            out.set_int(&name("height_ao_index"), -1);
            continue;
        };

        let baked = layer.baked();
        let params = &layer.params;
        out.set_int(&name("albedo_index"), slot(baked.albedo_index()));
        out.set_int(&name("normal_index"), slot(baked.normal_index()));
        out.set_int(&name("height_ao_index"), slot(baked.height_ao_index()));

        out.set_float(&name("tiling"), layer.tiling().near);
        out.set_float(&name("far_multiplier"), layer.tiling().far);
        out.set_float(&name("detail_power"), params.detail_power);
        out.set_float(&name("snow_reduction"), params.snow_reduction);
        out.set_float(&name("geological_power"), params.geological_power);
        out.set_float(&name("height_depth"), params.height_depth);
        out.set_float(&name("height_contrast"), params.height_contrast);
        out.set_float(&name("height_blend_near"), params.height_blend_near);
        out.set_float(&name("height_blend_far"), params.height_blend_far);
        out.set_float(&name("tessellation_depth"), params.tessellation_depth);
        let bounds = baked.height_bounds();
        out.set_float(&name("height_min"), bounds.min as f32 / 255.0);
        out.set_float(&name("height_max"), bounds.max as f32 / 255.0);
        out.set_float(&name("ao_power"), params.ao_power);
        out.set_float(&name("normal_power"), params.normal_strength);
        out.set_float(&name("triplanar"), if params.triplanar { 1.0 } else { 0.0 });
        out.set_vector(&name("average"), baked.average());
        let [r, g, b] = params.tint;
        out.set_vector(
            &name("color"),
            [
                r * params.tint_brightness,
                g * params.tint_brightness,
                b * params.tint_brightness,
                params.smoothness,
            ],
        );
    }
}
