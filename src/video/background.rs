//! Background frame renderer
//!
//! Vertical gradient over the background color, a double accent border,
//! corner squares, small eight-pointed stars, the episode title with an
//! optional subtitle line and a faint watermark. Text uses the first
//! system font found; without one the frame is rendered text-free.

use std::f32::consts::PI;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb as Pixel, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_polygon_mut, draw_text_mut, text_size};
use imageproc::point::Point;
use imageproc::rect::Rect;
use tracing::debug;

use crate::error::VideoCompositionError;
use crate::plan::{Rgb, VideoStyle};

const MARGIN: i32 = 45;
const CORNER: i32 = 20;
const STAR_RADIUS: f32 = 12.0;
/// Bottom rows are this much darker than the top
const GRADIENT_DARKENING: f32 = 0.2;

const TITLE_PX: f32 = 64.0;
const SUBTITLE_PX: f32 = 36.0;
const WATERMARK_PX: f32 = 22.0;
const SHADOW_OFFSET: i32 = 3;
const WATERMARK: &str = "Generated with PodClaw";

/// `(regular, bold)` font files, tried in order
const FONT_CANDIDATES: [(&str, &str); 4] = [
    (
        "/System/Library/Fonts/Supplemental/Georgia.ttf",
        "/System/Library/Fonts/Supplemental/Georgia Bold.ttf",
    ),
    (
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    ),
    (
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    ),
    (
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    ),
];

fn pixel(c: Rgb) -> Pixel<u8> {
    Pixel([c.0, c.1, c.2])
}

/// First loadable system font
fn load_font(bold: bool) -> Option<FontVec> {
    FONT_CANDIDATES.iter().find_map(|&(regular, heavy)| {
        let path = if bold { heavy } else { regular };
        let bytes = std::fs::read(path).ok()?;
        FontVec::try_from_vec(bytes).ok()
    })
}

/// Render the background image in memory.
///
/// `title` is centred just above the middle, `subtitle` just below it.
pub fn render_background(style: &VideoStyle, title: Option<&str>, subtitle: Option<&str>) -> RgbImage {
    let (width, height) = (style.resolution.width, style.resolution.height);
    let mut img = RgbImage::from_fn(width, height, |_, y| {
        let factor = 1.0 - (y as f32 / height as f32) * GRADIENT_DARKENING;
        pixel(style.background.scaled(factor))
    });

    let (w, h) = (width as i32, height as i32);
    let accent = pixel(style.accent);

    stroke_rect(&mut img, MARGIN, MARGIN, w - MARGIN, h - MARGIN, 3, accent);
    stroke_rect(
        &mut img,
        MARGIN + 8,
        MARGIN + 8,
        w - MARGIN - 8,
        h - MARGIN - 8,
        1,
        accent,
    );

    let inset = MARGIN + 20;
    let half = CORNER / 2;
    for (cx, cy) in [
        (inset, inset),
        (w - inset, inset),
        (inset, h - inset),
        (w - inset, h - inset),
    ] {
        stroke_rect(&mut img, cx - half, cy - half, cx + half, cy + half, 2, accent);
    }

    for (sx, sy) in [
        (200, 100),
        (w - 200, 100),
        (200, h - 100),
        (w - 200, h - 100),
        (100, h / 2),
        (w - 100, h / 2),
    ] {
        fill_star(&mut img, sx as f32, sy as f32, STAR_RADIUS, accent);
    }

    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(font) = load_font(true) {
            let y = h / 2 - 80;
            let x = centered_x(w, TITLE_PX, &font, title);
            let shadow = Pixel([0, 0, 0]);
            let (sx, sy) = (x + SHADOW_OFFSET, y + SHADOW_OFFSET);
            draw_text_mut(&mut img, shadow, sx, sy, PxScale::from(TITLE_PX), &font, title);
            draw_text_mut(&mut img, pixel(style.text), x, y, PxScale::from(TITLE_PX), &font, title);
        }
    }

    let regular = load_font(false);
    if let Some(font) = &regular {
        if let Some(subtitle) = subtitle.map(str::trim).filter(|t| !t.is_empty()) {
            let x = centered_x(w, SUBTITLE_PX, font, subtitle);
            draw_text_mut(&mut img, accent, x, h / 2 + 20, PxScale::from(SUBTITLE_PX), font, subtitle);
        }

        let faint = watermark_color(style.background);
        let x = centered_x(w, WATERMARK_PX, font, WATERMARK);
        draw_text_mut(&mut img, pixel(faint), x, h - 80, PxScale::from(WATERMARK_PX), font, WATERMARK);
    } else {
        debug!("no system font found, background rendered without text");
    }

    img
}

/// Render and save the background as PNG.
pub fn write_background(
    path: &Path,
    style: &VideoStyle,
    title: Option<&str>,
    subtitle: Option<&str>,
) -> Result<(), VideoCompositionError> {
    render_background(style, title, subtitle)
        .save(path)
        .map_err(|e| VideoCompositionError::Background(format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), resolution = %style.resolution, "background written");
    Ok(())
}

/// Each channel 60 below the background, floored at black
fn watermark_color(background: Rgb) -> Rgb {
    Rgb(
        background.0.saturating_sub(60),
        background.1.saturating_sub(60),
        background.2.saturating_sub(60),
    )
}

fn centered_x(width: i32, px: f32, font: &FontVec, text: &str) -> i32 {
    let (text_width, _) = text_size(PxScale::from(px), font, text);
    (width - text_width as i32) / 2
}

/// Rectangle outline `width` pixels thick, drawn inward from the inclusive
/// corners `(x0, y0)` and `(x1, y1)`.
fn stroke_rect(img: &mut RgbImage, x0: i32, y0: i32, x1: i32, y1: i32, width: i32, px: Pixel<u8>) {
    for t in 0..width {
        let (w, h) = (x1 - x0 + 1 - 2 * t, y1 - y0 + 1 - 2 * t);
        if w <= 0 || h <= 0 {
            break;
        }
        draw_hollow_rect_mut(img, Rect::at(x0 + t, y0 + t).of_size(w as u32, h as u32), px);
    }
}

/// Eight-point star, alternating outer and 0.4x inner radius.
fn fill_star(img: &mut RgbImage, cx: f32, cy: f32, radius: f32, px: Pixel<u8>) {
    let points: Vec<Point<i32>> = (0..8)
        .map(|i| {
            let angle = (i as f32 * 45.0 - 90.0) * PI / 180.0;
            let r = if i % 2 == 0 { radius } else { radius * 0.4 };
            Point::new(
                (cx + r * angle.cos()).round() as i32,
                (cy + r * angle.sin()).round() as i32,
            )
        })
        .collect();
    draw_polygon_mut(img, &points, px);
}
