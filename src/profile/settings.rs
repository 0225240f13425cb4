use bon::Builder;

use crate::texture::FilterMode;
use crate::texture::TextureSize;

/// Shader variant a profile renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShaderType {
    /// The host's own terrain shader. No arrays are bound.
    Native,
    Basic,
    #[default]
    Advanced,
    Tessellation,
}

impl ShaderType {
    /// Whether this variant samples height/AO slices, and so whether the
    /// albedo array has to carry them.
    pub fn samples_height_ao(self) -> bool {
        matches!(self, ShaderType::Advanced | ShaderType::Tessellation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AoType {
    None,
    #[default]
    NormalMapBased,
    TextureBased,
}

impl AoType {
    pub fn shader_value(self) -> i32 {
        match self {
            AoType::None => 0,
            AoType::NormalMapBased => 1,
            AoType::TextureBased => 2,
        }
    }
}

/// Shader-wide values that never affect baking.
#[derive(Builder, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GlobalShading {
    #[builder(default = 3.0)]
    pub uv_mix_power: f32,
    #[builder(default = 400.0)]
    pub uv_mix_start_distance: f32,
    #[builder(default = 0.1)]
    pub global_normal_power: f32,
    #[builder(default = 1.0)]
    pub smoothness: f32,
    #[builder(default = 1.0)]
    pub specular: f32,
    #[builder(default = 7.0)]
    pub tessellation_power: f32,
    #[builder(default = 0.0)]
    pub tessellation_min_distance: f32,
    #[builder(default = 50.0)]
    pub tessellation_max_distance: f32,
    #[builder(default = 1.0)]
    pub tessellation_phong: f32,
    #[builder(default)]
    pub ao_type: AoType,
    #[builder(default = 1.0)]
    pub ao_power: f32,
    #[builder(default = 0.0)]
    pub color_map_near_power: f32,
    #[builder(default = 0.0)]
    pub color_map_far_power: f32,
    /// Strip host paint data once a custom material is bound at runtime.
    #[builder(default = true)]
    pub optimise_at_runtime: bool,
}

impl Default for GlobalShading {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Bake geometry and shader selection for one profile. Everything here that
/// changes baked output is only writable through the profile's commands so
/// the dirty state stays correct.
#[derive(Builder, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProfileSettings {
    #[builder(default)]
    albedo_size: TextureSize,
    #[builder(default)]
    normal_size: TextureSize,
    #[builder(default)]
    albedo_compress: bool,
    #[builder(default)]
    normal_compress: bool,
    #[builder(default = 8)]
    albedo_aniso: u8,
    #[builder(default = 8)]
    normal_aniso: u8,
    #[builder(default)]
    albedo_filter: FilterMode,
    #[builder(default)]
    normal_filter: FilterMode,
    #[builder(default)]
    shader_type: ShaderType,
    #[builder(default)]
    pub shading: GlobalShading,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ProfileSettings {
    pub fn albedo_size(&self) -> TextureSize {
        self.albedo_size
    }

    pub fn normal_size(&self) -> TextureSize {
        self.normal_size
    }

    pub fn albedo_compress(&self) -> bool {
        self.albedo_compress
    }

    pub fn normal_compress(&self) -> bool {
        self.normal_compress
    }

    pub fn albedo_aniso(&self) -> u8 {
        self.albedo_aniso
    }

    pub fn normal_aniso(&self) -> u8 {
        self.normal_aniso
    }

    pub fn albedo_filter(&self) -> FilterMode {
        self.albedo_filter
    }

    pub fn normal_filter(&self) -> FilterMode {
        self.normal_filter
    }

    pub fn shader_type(&self) -> ShaderType {
        self.shader_type
    }

    pub(crate) fn set_albedo_size(&mut self, size: TextureSize) -> bool {
        std::mem::replace(&mut self.albedo_size, size) != size
    }

    pub(crate) fn set_normal_size(&mut self, size: TextureSize) -> bool {
        std::mem::replace(&mut self.normal_size, size) != size
    }

    pub(crate) fn set_albedo_compress(&mut self, compress: bool) -> bool {
        std::mem::replace(&mut self.albedo_compress, compress) != compress
    }

    pub(crate) fn set_normal_compress(&mut self, compress: bool) -> bool {
        std::mem::replace(&mut self.normal_compress, compress) != compress
    }

    pub(crate) fn set_albedo_sampling(&mut self, filter: FilterMode, aniso: u8) -> bool {
        let changed = self.albedo_filter != filter || self.albedo_aniso != aniso;
        self.albedo_filter = filter;
        self.albedo_aniso = aniso;
        changed
    }

    pub(crate) fn set_normal_sampling(&mut self, filter: FilterMode, aniso: u8) -> bool {
        let changed = self.normal_filter != filter || self.normal_aniso != aniso;
        self.normal_filter = filter;
        self.normal_aniso = aniso;
        changed
    }

    pub(crate) fn set_shader_type(&mut self, shader_type: ShaderType) -> bool {
        std::mem::replace(&mut self.shader_type, shader_type) != shader_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = ProfileSettings::default();
        assert_eq!(settings.albedo_size(), TextureSize::Size1024);
        assert_eq!(settings.normal_aniso(), 8);
        assert!(!settings.albedo_compress());
        assert_eq!(settings.shader_type(), ShaderType::Advanced);
        assert_eq!(settings.shading.ao_type, AoType::NormalMapBased);
        assert!(settings.shading.optimise_at_runtime);
    }

    #[test]
    fn setters_report_changes() {
        let mut settings = ProfileSettings::default();
        assert!(!settings.set_albedo_size(TextureSize::Size1024));
        assert!(settings.set_albedo_size(TextureSize::Size512));
        assert!(settings.set_shader_type(ShaderType::Basic));
        assert!(!ShaderType::Basic.samples_height_ao());
        assert!(ShaderType::Tessellation.samples_height_ao());
    }
}
