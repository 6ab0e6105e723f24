//! Image preprocessing and augmentation
//!
//! All fundus photographs pass through a shared geometry stage (shorter-side
//! resize followed by a center crop to a square) so every batch has a fixed
//! shape. Training additionally applies a random rotation over the full
//! circle and a random vertical flip. Rotation uses inverse-mapped bilinear
//! sampling with zero fill, so the output keeps the input dimensions.

use image::{imageops, DynamicImage, Rgb, RgbImage};
use rand::Rng;

/// Resize so the shorter side equals `target`, preserving aspect ratio.
/// Images already at the target shorter side pass through untouched.
pub fn resize_shorter_side(img: &DynamicImage, target: u32) -> RgbImage {
    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();
    let short = w.min(h);
    if short == target {
        return rgb;
    }
    let scale = target as f64 / short as f64;
    let new_w = ((w as f64 * scale).round() as u32).max(target);
    let new_h = ((h as f64 * scale).round() as u32).max(target);
    imageops::resize(&rgb, new_w, new_h, imageops::FilterType::Triangle)
}

/// Crop a centered `size` x `size` square. The input must be at least
/// `size` in both dimensions.
pub fn center_crop(img: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let x = (w - size) / 2;
    let y = (h - size) / 2;
    imageops::crop_imm(img, x, y, size, size).to_image()
}

/// Rotate about the image center by `degrees`, zero-filling uncovered
/// corners. Output dimensions equal input dimensions.
pub fn rotate_about_center(img: &RgbImage, degrees: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    let cx = (w as f32 - 1.0) / 2.0;
    let cy = (h as f32 - 1.0) / 2.0;
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();

    let mut out = RgbImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            // Inverse map: where in the source does this output pixel come from
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let sx = cos * dx + sin * dy + cx;
            let sy = -sin * dx + cos * dy + cy;
            out.put_pixel(x, y, sample_bilinear(img, sx, sy));
        }
    }
    out
}

/// Flip top-to-bottom
pub fn flip_vertical(img: &RgbImage) -> RgbImage {
    imageops::flip_vertical(img)
}

/// Apply the randomized training transforms: rotation by a uniform angle in
/// [0, 360) degrees, then a vertical flip with probability 0.5.
pub fn augment_train<R: Rng>(img: &RgbImage, rng: &mut R) -> RgbImage {
    let angle = rng.gen_range(0.0f32..360.0);
    let rotated = rotate_about_center(img, angle);
    if rng.gen_bool(0.5) {
        flip_vertical(&rotated)
    } else {
        rotated
    }
}

/// Convert to planar CHW f32 in [0, 1]
pub fn to_chw_floats(img: &RgbImage) -> Vec<f32> {
    let (w, h) = img.dimensions();
    let (w, h) = (w as usize, h as usize);
    let mut out = vec![0.0f32; 3 * h * w];
    for (x, y, pixel) in img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            out[c * h * w + y * w + x] = pixel.0[c] as f32 / 255.0;
        }
    }
    out
}

fn sample_bilinear(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (w, h) = img.dimensions();
    if x < 0.0 || y < 0.0 || x > (w - 1) as f32 || y > (h - 1) as f32 {
        return Rgb([0, 0, 0]);
    }
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0).0;
    let p10 = img.get_pixel(x1, y0).0;
    let p01 = img.get_pixel(x0, y1).0;
    let p11 = img.get_pixel(x1, y1).0;

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn gradient_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_resize_shorter_side() {
        let img = DynamicImage::ImageRgb8(gradient_image(200, 100));
        let resized = resize_shorter_side(&img, 50);
        assert_eq!(resized.dimensions(), (100, 50));
    }

    #[test]
    fn test_resize_noop_at_target() {
        let img = DynamicImage::ImageRgb8(gradient_image(80, 64));
        let resized = resize_shorter_side(&img, 64);
        assert_eq!(resized.dimensions(), (80, 64));
    }

    #[test]
    fn test_center_crop() {
        let img = gradient_image(100, 60);
        let cropped = center_crop(&img, 60);
        assert_eq!(cropped.dimensions(), (60, 60));
        // Center pixel survives the crop
        assert_eq!(cropped.get_pixel(30, 30), img.get_pixel(50, 30));
    }

    #[test]
    fn test_rotation_preserves_dimensions() {
        let img = gradient_image(48, 48);
        let rotated = rotate_about_center(&img, 137.5);
        assert_eq!(rotated.dimensions(), (48, 48));
    }

    #[test]
    fn test_rotation_by_zero_is_identity() {
        let img = gradient_image(32, 32);
        let rotated = rotate_about_center(&img, 0.0);
        assert_eq!(rotated, img);
    }

    #[test]
    fn test_vertical_flip_twice_is_identity() {
        let img = gradient_image(16, 24);
        assert_eq!(flip_vertical(&flip_vertical(&img)), img);
    }

    #[test]
    fn test_chw_layout() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(1, 0, Rgb([255, 0, 0]));
        let floats = to_chw_floats(&img);
        assert_eq!(floats.len(), 12);
        // Red channel, row 0, col 1
        assert!((floats[1] - 1.0).abs() < 1e-6);
        // Green channel of the same pixel
        assert!((floats[4 + 1] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_augment_is_deterministic_for_seed() {
        let img = gradient_image(24, 24);
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(augment_train(&img, &mut a), augment_train(&img, &mut b));
    }
}
