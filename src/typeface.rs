use std::fmt::Display;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_text_mut, text_size},
    rect::Rect,
};
use log::{debug, warn};
use rusttype::{Font, Scale};

/// Fonts tried, in order, when no font path is configured.
const CANDIDATE_FONT_PATHS: [&str; 5] = [
    "arial.ttf",
    "Arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:/Windows/Fonts/arial.ttf",
];

#[derive(Debug)]
pub enum RenderError {
    FontUnavailable(PathBuf),
    FontInvalid(PathBuf),
}

impl Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::FontUnavailable(path) => {
                write!(f, "font {} is not available", path.display())
            }
            RenderError::FontInvalid(path) => {
                write!(f, "font {} could not be parsed", path.display())
            }
        }
    }
}

impl std::error::Error for RenderError {}

/// The face used to draw every label on a sheet. `Bitmap` is a built-in
/// 5x7 dot font that needs no external resources.
#[derive(Clone)]
pub enum Typeface {
    TrueType(Font<'static>),
    Bitmap,
}

impl std::fmt::Debug for Typeface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Typeface::TrueType(_) => write!(f, "Typeface::TrueType"),
            Typeface::Bitmap => write!(f, "Typeface::Bitmap"),
        }
    }
}

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const GLYPH_ADVANCE: i32 = 6;

impl Typeface {
    /// Measures `text` drawn at the given pixel height.
    pub fn text_size(&self, px: f32, text: &str) -> (i32, i32) {
        match self {
            Typeface::TrueType(font) => text_size(Scale::uniform(px), font, text),
            Typeface::Bitmap => {
                let cell = bitmap_cell_size(px);
                let count = text.chars().count() as i32;
                if count == 0 {
                    return (0, 0);
                }
                (
                    (count - 1) * GLYPH_ADVANCE * cell + GLYPH_WIDTH * cell,
                    GLYPH_HEIGHT * cell,
                )
            }
        }
    }

    pub fn draw_text_mut(
        &self,
        canvas: &mut RgbImage,
        color: Rgb<u8>,
        x: i32,
        y: i32,
        px: f32,
        text: &str,
    ) {
        match self {
            Typeface::TrueType(font) => {
                draw_text_mut(canvas, color, x, y, Scale::uniform(px), font, text)
            }
            Typeface::Bitmap => draw_bitmap_text_mut(canvas, color, x, y, px, text),
        }
    }
}

fn bitmap_cell_size(px: f32) -> i32 {
    ((px / 8.0).round() as i32).max(1)
}

fn draw_bitmap_text_mut(canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, px: f32, text: &str) {
    let cell = bitmap_cell_size(px);
    for (i, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else {
            continue;
        };
        let glyph_x = x + i as i32 * GLYPH_ADVANCE * cell;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                    draw_filled_rect_mut(
                        canvas,
                        Rect::at(glyph_x + col * cell, y + row as i32 * cell)
                            .of_size(cell as u32, cell as u32),
                        color,
                    );
                }
            }
        }
    }
}

/// Rows of a 5x7 glyph, most significant of the low five bits leftmost.
fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c.to_ascii_uppercase() {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        '/' => [0x01, 0x02, 0x02, 0x04, 0x08, 0x08, 0x10],
        _ => return None,
    };
    Some(rows)
}

pub fn load_typeface(path: &Path) -> Result<Typeface, RenderError> {
    let bytes =
        std::fs::read(path).map_err(|_| RenderError::FontUnavailable(path.to_path_buf()))?;
    Font::try_from_vec(bytes)
        .map(Typeface::TrueType)
        .ok_or_else(|| RenderError::FontInvalid(path.to_path_buf()))
}

/// Loads the configured font, or the first well-known system font when none
/// is configured. Never fails: a missing font degrades to the bitmap face.
pub fn find_typeface(font_path: Option<&Path>) -> Typeface {
    if let Some(font_path) = font_path {
        return match load_typeface(font_path) {
            Ok(typeface) => typeface,
            Err(e) => {
                warn!("{}, using built-in bitmap font", e);
                Typeface::Bitmap
            }
        };
    }

    for candidate in CANDIDATE_FONT_PATHS {
        if let Ok(typeface) = load_typeface(Path::new(candidate)) {
            debug!("using font {}", candidate);
            return typeface;
        }
    }

    warn!("no system font found, using built-in bitmap font");
    Typeface::Bitmap
}
