use image::Rgba;
use image::RgbaImage;

use super::WeightData;
use crate::texture::color::linear_to_srgb;

/// Blends linear per-layer average colours by paint weight into an sRGB
/// base colour map the size of the weight grid.
///
/// Layers are folded in order, each lerping the running colour towards its
/// average by its weight, starting from black. An all-zero average marks a
/// layer with no baked albedo and is skipped. Returns `None` for empty
/// weights.
pub fn bake_color_map(weights: &WeightData, averages: &[[f32; 4]]) -> Option<RgbaImage> {
    if weights.is_empty() || weights.width == 0 || weights.height == 0 {
        return None;
    }

    let layers = weights.layers.min(averages.len());
    Some(RgbaImage::from_fn(weights.width, weights.height, |x, y| {
        let mut color = [0.0f32; 3];
        for (layer, average) in averages.iter().enumerate().take(layers) {
            if *average == [0.0; 4] {
                continue;
            }
            let t = weights.weight(x, y, layer).clamp(0.0, 1.0);
            for (channel, target) in color.iter_mut().zip(average) {
                *channel += (target - *channel) * t;
            }
        }
        let [r, g, b] = color;
        Rgba([linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(b), 255])
    }))
}

/// Packs terrain normals into a `width` x `height` map: G holds the normal's
/// y and A its x, both remapped from -1..1 to 0..255. R and B stay zero.
/// Pixel `(x, y)` samples `normal_at(x / width, y / height)`.
pub fn bake_normal_map(width: u32, height: u32, normal_at: impl Fn(f32, f32) -> [f32; 3]) -> Option<RgbaImage> {
    if width == 0 || height == 0 {
        return None;
    }

    let pack = |value: f32| ((value * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8;
    Some(RgbaImage::from_fn(width, height, |x, y| {
        let [nx, ny, _] = normal_at(x as f32 / width as f32, y as f32 / height as f32);
        Rgba([0, pack(ny), 0, pack(nx)])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_layers_win_at_full_weight() {
        let mut weights = WeightData::new(2, 1, 2);
        weights.set_weight(0, 0, 0, 1.0);
        weights.set_weight(1, 0, 0, 1.0);
        weights.set_weight(1, 0, 1, 1.0);
        let averages = [[1.0, 0.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]];

        let map = bake_color_map(&weights, &averages).unwrap();
        assert_eq!(*map.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*map.get_pixel(1, 0), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn unbaked_layers_do_not_darken() {
        let mut weights = WeightData::new(1, 1, 2);
        weights.set_weight(0, 0, 0, 1.0);
        weights.set_weight(0, 0, 1, 1.0);
        let averages = [[1.0, 1.0, 1.0, 1.0], [0.0; 4]];

        let map = bake_color_map(&weights, &averages).unwrap();
        assert_eq!(*map.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn normals_pack_y_into_green_and_x_into_alpha() {
        let map = bake_normal_map(4, 2, |u, _| if u < 0.5 { [0.0, 1.0, 0.0] } else { [-1.0, 0.0, 0.0] }).unwrap();
        assert_eq!(map.dimensions(), (4, 2));
        assert_eq!(*map.get_pixel(0, 0), Rgba([0, 255, 0, 128]));
        assert_eq!(*map.get_pixel(3, 1), Rgba([0, 128, 0, 0]));
        assert!(bake_normal_map(0, 4, |_, _| [0.0, 1.0, 0.0]).is_none());
    }

    #[test]
    fn empty_weights_bake_nothing() {
        assert!(bake_color_map(&WeightData::default(), &[[1.0; 4]]).is_none());
    }
}
