// THEORY:
// The canvas maps detector millimetres onto image pixels and wraps the few
// drawing primitives the viewer needs. World y grows downward, like image
// rows, so the mapping is a plain scale and shift:
//
//     pixel = (world - origin) * scale + margin
//
// Labels are drawn with an embedded DejaVu Sans Mono, centered on their
// anchor point.

use ecal_trigger::core_modules::colorizer::Rgba as Color;
use ecal_trigger::core_modules::module::{Bounds, Point};
use ab_glyph::{FontRef, InvalidFont, PxScale};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError, Pixel, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
    text_size,
};
use imageproc::rect::Rect;
use std::path::Path;

const LABEL_FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

/// The embedded label font.
pub fn label_font() -> Result<FontRef<'static>, InvalidFont> {
    FontRef::try_from_slice(LABEL_FONT)
}

pub fn to_pixel_color(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, color.a])
}

pub struct Canvas {
    image: RgbaImage,
    origin: Point,
    scale: f64,
    margin: f64,
}

impl Canvas {
    /// A canvas that shows `bounds` at `scale` pixels per mm, filled with `background`.
    pub fn covering(bounds: Bounds, scale: f64, margin: u32, background: Color) -> Self {
        let width = (bounds.width() * scale).ceil().max(0.0) as u32 + 2 * margin;
        let height = (bounds.height() * scale).ceil().max(0.0) as u32 + 2 * margin;
        Self {
            image: RgbaImage::from_pixel(width.max(1), height.max(1), to_pixel_color(background)),
            origin: Point::new(bounds.min_x, bounds.min_y),
            scale,
            margin: f64::from(margin),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn to_pixel(&self, point: Point) -> (f32, f32) {
        (
            ((point.x - self.origin.x) * self.scale + self.margin) as f32,
            ((point.y - self.origin.y) * self.scale + self.margin) as f32,
        )
    }

    fn rect(&self, min: Point, max: Point) -> Rect {
        let (x0, y0) = self.to_pixel(min);
        let (x1, y1) = self.to_pixel(max);
        let width = (x1 - x0).round().max(1.0) as u32;
        let height = (y1 - y0).round().max(1.0) as u32;
        Rect::at(x0.round() as i32, y0.round() as i32).of_size(width, height)
    }

    fn square(&self, center: Point, side: f64) -> Rect {
        let half = side / 2.0;
        self.rect(
            Point::new(center.x - half, center.y - half),
            Point::new(center.x + half, center.y + half),
        )
    }

    pub fn fill_square(&mut self, center: Point, side: f64, color: Color) {
        let rect = self.square(center, side);
        draw_filled_rect_mut(&mut self.image, rect, to_pixel_color(color));
    }

    pub fn outline_square(&mut self, center: Point, side: f64, color: Color) {
        let rect = self.square(center, side);
        draw_hollow_rect_mut(&mut self.image, rect, to_pixel_color(color));
    }

    /// Alpha-blends `color` over everything inside `bounds`.
    pub fn blend_rect(&mut self, bounds: Bounds, color: Color) {
        let rect = self.rect(
            Point::new(bounds.min_x, bounds.min_y),
            Point::new(bounds.max_x, bounds.max_y),
        );
        let overlay = to_pixel_color(color);
        let x_end = (rect.right() + 1).clamp(0, self.image.width() as i32) as u32;
        let y_end = (rect.bottom() + 1).clamp(0, self.image.height() as i32) as u32;
        for y in rect.top().max(0) as u32..y_end {
            for x in rect.left().max(0) as u32..x_end {
                self.image.get_pixel_mut(x, y).blend(&overlay);
            }
        }
    }

    pub fn line(&mut self, start: Point, end: Point, color: Color) {
        let start = self.to_pixel(start);
        let end = self.to_pixel(end);
        draw_line_segment_mut(&mut self.image, start, end, to_pixel_color(color));
    }

    pub fn disc(&mut self, center: Point, radius: f64, color: Color) {
        let (x, y) = self.to_pixel(center);
        let radius = (radius * self.scale).round().max(1.0) as i32;
        draw_filled_circle_mut(&mut self.image, (x.round() as i32, y.round() as i32), radius, to_pixel_color(color));
    }

    /// Prints `text` centered on `center`, `height` pixels tall.
    pub fn label(&mut self, center: Point, text: &str, font: &FontRef<'_>, height: f32, color: Color) {
        let scale = PxScale::from(height);
        let (width, text_height) = text_size(scale, font, text);
        let (cx, cy) = self.to_pixel(center);
        let left = cx.round() as i32 - (width / 2) as i32;
        let top = cy.round() as i32 - (text_height / 2) as i32;
        draw_text_mut(&mut self.image, to_pixel_color(color), left, top, scale, font, text);
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), ImageError> {
    let output = std::fs::File::create(path)?;
    let encoder = PngEncoder::new(std::io::BufWriter::new(output));
    encoder.write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgba8)?;
    Ok(())
}
