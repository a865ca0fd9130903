use image::{imageops::crop_imm, GrayImage, Luma, Rgb};
use imageproc::{
    distance_transform::Norm, filter::gaussian_blur_f32, morphology::open, rect::Rect,
};
use logging_timer::time;

pub const WHITE: Luma<u8> = Luma([u8::MAX]);
pub const BLACK: Luma<u8> = Luma([u8::MIN]);

pub const WHITE_RGB: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK_RGB: Rgb<u8> = Rgb([0, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const ORANGE: Rgb<u8> = Rgb([255, 165, 0]);
pub const GRAY: Rgb<u8> = Rgb([128, 128, 128]);

/// Side of the neighbourhood the local threshold is computed over.
pub const ADAPTIVE_BLOCK_SIZE: u32 = 15;
/// How much darker than its neighbourhood a pixel must be to count as ink.
pub const ADAPTIVE_OFFSET: u8 = 10;

/// Separates ink from paper. Returns an image in which ink is `WHITE` and
/// paper is `BLACK`, with specks smaller than 3x3 removed.
#[time]
pub fn binarize(img: &GrayImage) -> GrayImage {
    let ink = adaptive_threshold_inverted(img, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_OFFSET);
    open(&ink, Norm::LInf, 1)
}

/// Marks every pixel at least `offset` darker than the gaussian-weighted mean
/// of its `block_size` neighbourhood. Unlike a global threshold this copes
/// with shadows and uneven scanner lighting.
pub fn adaptive_threshold_inverted(img: &GrayImage, block_size: u32, offset: u8) -> GrayImage {
    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let local_mean = gaussian_blur_f32(img, sigma.max(0.1));

    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let mean = local_mean.get_pixel(x, y).0[0] as i32;
        let is_ink = pixel.0[0] as i32 <= mean - offset as i32;
        out.put_pixel(x, y, if is_ink { WHITE } else { BLACK });
    }
    out
}

/// Determines the number of pixels in an image that match the given luma.
pub fn count_pixels(img: &GrayImage, luma: &Luma<u8>) -> u32 {
    img.pixels().filter(|p| *p == luma).count() as u32
}

/// Determines the ratio of pixels in an image that match the given luma.
pub fn ratio(img: &GrayImage, luma: &Luma<u8>) -> f32 {
    let total = img.width() * img.height();
    if total == 0 {
        return 0.0;
    }
    count_pixels(img, luma) as f32 / total as f32
}

/// Determines the ratio of pixels inside `rect` that match the given luma.
/// `rect` must lie within the image.
pub fn ratio_in_rect(img: &GrayImage, rect: &Rect, luma: &Luma<u8>) -> f32 {
    let region = crop_imm(
        img,
        rect.left() as u32,
        rect.top() as u32,
        rect.width(),
        rect.height(),
    )
    .to_image();
    ratio(&region, luma)
}
