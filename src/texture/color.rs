//! sRGB transfer functions and colour helpers.

use image::Rgba;
use image::Rgba32FImage;
use image::RgbaImage;
use image::imageops;
use image::imageops::FilterType;

use super::ColorSpace;
use super::Texture;

pub fn srgb_to_linear(value: u8) -> f32 {
    let c = value as f32 / 255.0;
    if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
}

pub fn linear_to_srgb(value: f32) -> u8 {
    let c = value.clamp(0.0, 1.0);
    let encoded = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round() as u8
}

fn to_linear(image: &RgbaImage) -> Rgba32FImage {
    Rgba32FImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgba([r, g, b, a]) = *image.get_pixel(x, y);
        Rgba([
            srgb_to_linear(r),
            srgb_to_linear(g),
            srgb_to_linear(b),
            a as f32 / 255.0,
        ])
    })
}

fn to_srgb(image: &Rgba32FImage) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgba([r, g, b, a]) = *image.get_pixel(x, y);
        Rgba([
            linear_to_srgb(r),
            linear_to_srgb(g),
            linear_to_srgb(b),
            (a.clamp(0.0, 1.0) * 255.0).round() as u8,
        ])
    })
}

/// Resizes an sRGB-encoded image, filtering in linear light.
pub fn resize_linear_light(
    image: &RgbaImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> RgbaImage {
    let linear = to_linear(image);
    let resized = imageops::resize(&linear, width, height, filter);
    to_srgb(&resized)
}

/// Linear-space average colour of a texture, read from its smallest mip.
/// Alpha is returned as stored.
pub fn average_color(texture: &Texture) -> [f32; 4] {
    let Some(lowest) = texture.mips().last() else {
        return [0.0; 4];
    };
    let summary = if lowest.width() == 1 && lowest.height() == 1 {
        *lowest.get_pixel(0, 0)
    } else {
        *imageops::resize(lowest, 1, 1, FilterType::Triangle).get_pixel(0, 0)
    };

    let Rgba([r, g, b, a]) = summary;
    let channel = |v: u8| match texture.color_space() {
        ColorSpace::Srgb => srgb_to_linear(v),
        ColorSpace::Linear => v as f32 / 255.0,
    };
    [channel(r), channel(g), channel(b), a as f32 / 255.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_functions_round_trip_every_byte() {
        for value in 0..=255u8 {
            assert_eq!(linear_to_srgb(srgb_to_linear(value)), value);
        }
    }

    #[test]
    fn average_of_uniform_texture() {
        let mut tex = Texture::new("grey", RgbaImage::from_pixel(8, 8, Rgba([128, 128, 128, 255])));
        tex.generate_mips();
        let avg = average_color(&tex);

        let expected = srgb_to_linear(128);
        for channel in &avg[..3] {
            assert!((channel - expected).abs() < 0.01, "{channel} vs {expected}");
        }
        assert_eq!(avg[3], 1.0);
    }
}
