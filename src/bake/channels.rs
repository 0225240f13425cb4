//! Per-pixel channel packing. Every function resamples its inputs to the
//! slice size first, reads one channel from each, and finishes the packed
//! result with a full mip chain. Intermediates are dropped as soon as the
//! pack returns.

use image::Rgba;
use image::RgbaImage;

use super::SliceSpec;
use crate::texture::Texture;

/// Observed range of the height channel in a packed height/AO slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeightBounds {
    pub min: u8,
    pub max: u8,
}

impl Default for HeightBounds {
    fn default() -> Self {
        Self { min: 0, max: 255 }
    }
}

/// Packs height into RGB and ambient occlusion into A.
///
/// Height is read from the source's G channel and replicated into R, G and
/// B; the returned bounds are its observed min and max. Without a height
/// source RGB is 0 and the bounds stay at 0..255. AO is read from G and
/// defaults to fully unoccluded (255).
pub fn pack_height_ao(
    name: &str,
    height: Option<&Texture>,
    ambient_occlusion: Option<&Texture>,
    spec: &SliceSpec,
) -> (Texture, HeightBounds) {
    let mut packed = RgbaImage::from_pixel(spec.size, spec.size, Rgba([0, 0, 0, 255]));
    let mut bounds = HeightBounds::default();

    if let Some(height) = height.map(|h| spec.intermediate(h)) {
        let mut min = u8::MAX;
        let mut max = u8::MIN;
        for (dst, src) in packed.pixels_mut().zip(height.base().pixels()) {
            let h = src[1];
            min = min.min(h);
            max = max.max(h);
            dst[0] = h;
            dst[1] = h;
            dst[2] = h;
        }
        bounds = HeightBounds { min, max };
    }

    if let Some(ao) = ambient_occlusion.map(|ao| spec.intermediate(ao)) {
        for (dst, src) in packed.pixels_mut().zip(ao.base().pixels()) {
            dst[3] = src[1];
        }
    }

    (spec.finish(Texture::new(name, packed)), bounds)
}

/// Repacks a tangent-space normal map into G and A with neutral R and B.
/// Returns `None` when there is no source.
pub fn pack_normal(name: &str, normal: Option<&Texture>, spec: &SliceSpec) -> Option<Texture> {
    let normal = spec.intermediate(normal?);
    let mut packed = RgbaImage::new(spec.size, spec.size);
    for (dst, src) in packed.pixels_mut().zip(normal.base().pixels()) {
        *dst = Rgba([0x80, src[1], 0x80, src[3]]);
    }
    Some(spec.finish(Texture::new(name, packed)))
}

/// Albedo in RGB with smoothness in A.
///
/// A smoothness map's G channel wins; otherwise a roughness map's G is
/// inverted. With neither, alpha is whatever the resampled albedo carries.
pub fn pack_albedo_smoothness(
    name: &str,
    albedo: &Texture,
    smoothness: Option<&Texture>,
    roughness: Option<&Texture>,
    spec: &SliceSpec,
) -> Texture {
    let mut packed = spec.intermediate(albedo);

    if let Some(smoothness) = smoothness.map(|s| spec.intermediate(s)) {
        for (dst, src) in packed.base_mut().pixels_mut().zip(smoothness.base().pixels()) {
            dst[3] = src[1];
        }
    } else if let Some(roughness) = roughness.map(|r| spec.intermediate(r)) {
        for (dst, src) in packed.base_mut().pixels_mut().zip(roughness.base().pixels()) {
            dst[3] = 255 - src[1];
        }
    }

    spec.finish(Texture::new(name, packed.into_mips().swap_remove(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileSettings;
    use crate::texture::ArrayClass;
    use crate::texture::ColorSpace;
    use crate::texture::TextureSize;

    fn spec(class: ArrayClass) -> SliceSpec {
        let settings = ProfileSettings::builder()
            .albedo_size(TextureSize::Size64)
            .normal_size(TextureSize::Size64)
            .build();
        SliceSpec::for_class(class, &settings)
    }

    fn gradient(size: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| Rgba([x as u8, (x + y) as u8 + 10, 7, 99]))
    }

    #[test]
    fn height_ao_without_sources_is_black_and_unoccluded() {
        let (tex, bounds) = pack_height_ao("empty", None, None, &spec(ArrayClass::Albedo));

        assert_eq!(bounds, HeightBounds { min: 0, max: 255 });
        assert_eq!(tex.dimensions(), (64, 64));
        assert!(tex.base().pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
        assert_eq!(tex.mip_count(), 7);
    }

    #[test]
    fn height_is_replicated_and_bounded() {
        let height = Texture::linear("h", gradient(64));
        let ao = Texture::linear("ao", RgbaImage::from_pixel(64, 64, Rgba([0, 42, 0, 0])));

        let (tex, bounds) = pack_height_ao("hao", Some(&height), Some(&ao), &spec(ArrayClass::Albedo));

        assert_eq!(bounds, HeightBounds { min: 10, max: 136 });
        let p = tex.base().get_pixel(3, 5);
        assert_eq!(*p, Rgba([18, 18, 18, 42]));
    }

    #[test]
    fn normal_keeps_green_and_alpha_only() {
        assert!(pack_normal("none", None, &spec(ArrayClass::Normal)).is_none());

        let src = Texture::linear("n", RgbaImage::from_pixel(64, 64, Rgba([12, 200, 34, 77])));
        let tex = pack_normal("n", Some(&src), &spec(ArrayClass::Normal)).unwrap();

        assert_eq!(tex.color_space(), ColorSpace::Linear);
        assert!(tex.base().pixels().all(|p| *p == Rgba([0x80, 200, 0x80, 77])));
    }

    #[test]
    fn smoothness_wins_over_roughness() {
        let albedo = Texture::new("a", RgbaImage::from_pixel(64, 64, Rgba([50, 60, 70, 11])));
        let smooth = Texture::linear("s", RgbaImage::from_pixel(64, 64, Rgba([0, 180, 0, 0])));
        let rough = Texture::linear("r", RgbaImage::from_pixel(64, 64, Rgba([0, 100, 0, 0])));
        let spec = spec(ArrayClass::Albedo);

        let both = pack_albedo_smoothness("a", &albedo, Some(&smooth), Some(&rough), &spec);
        assert!(both.base().pixels().all(|p| *p == Rgba([50, 60, 70, 180])));

        let rough_only = pack_albedo_smoothness("a", &albedo, None, Some(&rough), &spec);
        assert!(rough_only.base().pixels().all(|p| p[3] == 155));

        let neither = pack_albedo_smoothness("a", &albedo, None, None, &spec);
        assert!(neither.base().pixels().all(|p| p[3] == 11));
    }
}
