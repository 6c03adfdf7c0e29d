use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::compositor::Canvas;

/// Scale factor that makes a `src_w × src_h` image cover a `diameter` square.
pub fn fill_scale(src_w: u32, src_h: u32, diameter: u32) -> f64 {
    let d = f64::from(diameter);
    (d / f64::from(src_w)).max(d / f64::from(src_h))
}

/// Fill-scales `source` and center-crops it into a `diameter` square.
///
/// The centered source rectangle that survives the crop is cut out first and
/// only that region is resampled, so memory stays bounded by the square no
/// matter how lopsided the source is.
pub fn fill_square(source: &RgbaImage, diameter: u32) -> RgbaImage {
    let (src_w, src_h) = source.dimensions();
    if src_w == 0 || src_h == 0 || diameter == 0 {
        return RgbaImage::new(diameter, diameter);
    }
    let span = f64::from(diameter) / fill_scale(src_w, src_h, diameter);
    let crop_w = (span.round() as u32).clamp(1, src_w);
    let crop_h = (span.round() as u32).clamp(1, src_h);
    let visible = imageops::crop_imm(
        source,
        (src_w - crop_w) / 2,
        (src_h - crop_h) / 2,
        crop_w,
        crop_h,
    )
    .to_image();
    imageops::resize(&visible, diameter, diameter, FilterType::Triangle)
}

/// Draws `source` as a circular portrait of `diameter` pixels centered on
/// `(center_x, center_y)`.
///
/// Only pixels inside the circle whose source alpha is non-zero are written,
/// and they replace the destination outright. A non-positive diameter or an
/// empty source draws nothing.
pub fn place_circular(
    canvas: &mut Canvas,
    source: &RgbaImage,
    center_x: i32,
    center_y: i32,
    diameter: i32,
) {
    if diameter <= 0 || source.width() == 0 || source.height() == 0 {
        return;
    }

    let square = fill_square(source, diameter as u32);
    let half = diameter / 2;
    let radius = f64::from(diameter) / 2.0;
    let origin_x = i64::from(center_x) - i64::from(half);
    let origin_y = i64::from(center_y) - i64::from(half);
    let (canvas_w, canvas_h) = (i64::from(canvas.width()), i64::from(canvas.height()));

    for (x, y, pixel) in square.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        let dx = f64::from(x as i32 - half);
        let dy = f64::from(y as i32 - half);
        if (dx * dx + dy * dy).sqrt() > radius {
            continue;
        }

        let px = origin_x + i64::from(x);
        let py = origin_y + i64::from(y);
        if px < 0 || py < 0 || px >= canvas_w || py >= canvas_h {
            continue;
        }
        canvas.put_pixel(px as u32, py as u32, *pixel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const BG: Rgba<u8> = Rgba([1, 2, 3, 255]);
    const FG: Rgba<u8> = Rgba([200, 100, 50, 255]);

    fn distance(x: u32, y: u32, cx: i32, cy: i32) -> f64 {
        let dx = f64::from(x as i32 - cx);
        let dy = f64::from(y as i32 - cy);
        (dx * dx + dy * dy).sqrt()
    }

    #[test]
    fn fill_scale_picks_the_larger_ratio() {
        assert_eq!(fill_scale(600, 300, 300), 1.0);
        assert_eq!(fill_scale(300, 600, 300), 1.0);
        assert_eq!(fill_scale(100, 50, 300), 6.0);
        assert_eq!(fill_scale(1000, 1000, 250), 0.25);
    }

    #[test]
    fn fill_square_has_no_transparent_corners() {
        for (w, h) in [(7, 3), (3, 7), (640, 480), (33, 1000), (1, 1)] {
            let source = RgbaImage::from_pixel(w, h, FG);
            let square = fill_square(&source, 101);
            assert_eq!(square.dimensions(), (101, 101));
            for (x, y) in [(0, 0), (100, 0), (0, 100), (100, 100), (50, 50)] {
                assert_eq!(square.get_pixel(x, y)[3], 255, "{w}x{h} corner {x},{y}");
            }
        }
    }

    #[test]
    fn extreme_aspect_ratio_only_resamples_the_visible_square() {
        let source = RgbaImage::from_pixel(1, 20000, FG);
        let square = fill_square(&source, 300);
        assert_eq!(square.dimensions(), (300, 300));

        let mut canvas = Canvas::from_pixel(400, 400, BG);
        place_circular(&mut canvas, &source, 200, 200, 300);
        assert_eq!(canvas.get_pixel(200, 200), &FG);
        assert_eq!(canvas.get_pixel(200, 60), &FG);
        assert_eq!(canvas.get_pixel(60, 60), &BG);
    }

    #[test]
    fn crop_keeps_the_center_of_the_source() {
        let mut source = RgbaImage::from_pixel(300, 100, BG);
        for y in 0..100 {
            for x in 100..200 {
                source.put_pixel(x, y, FG);
            }
        }
        let square = fill_square(&source, 50);
        assert_eq!(square.get_pixel(25, 25), &FG);
        assert_eq!(square.get_pixel(2, 25), &FG);
        assert_eq!(square.get_pixel(47, 25), &FG);
    }

    #[test]
    fn mask_boundary_is_respected() {
        let mut canvas = Canvas::from_pixel(200, 200, BG);
        let source = RgbaImage::from_pixel(50, 80, FG);
        let (cx, cy, d) = (100, 90, 60);
        place_circular(&mut canvas, &source, cx, cy, d);

        let radius = f64::from(d) / 2.0;
        for (x, y, pixel) in canvas.enumerate_pixels() {
            if distance(x, y, cx, cy) > radius {
                assert_eq!(pixel, &BG, "pixel {x},{y} outside the circle changed");
            } else if distance(x, y, cx, cy) < radius - 1.5 {
                assert_eq!(pixel, &FG, "pixel {x},{y} inside the circle not written");
            }
        }
    }

    #[test]
    fn transparent_source_pixels_never_touch_destination() {
        let mut canvas = Canvas::from_pixel(40, 40, BG);
        let source = RgbaImage::new(10, 10);
        place_circular(&mut canvas, &source, 20, 20, 30);
        assert!(canvas.pixels().all(|pixel| pixel == &BG));
    }

    #[test]
    fn non_positive_diameter_is_a_no_op() {
        let mut canvas = Canvas::from_pixel(10, 10, BG);
        let source = RgbaImage::from_pixel(4, 4, FG);
        place_circular(&mut canvas, &source, 5, 5, 0);
        place_circular(&mut canvas, &source, 5, 5, -12);
        assert!(canvas.pixels().all(|pixel| pixel == &BG));
    }

    #[test]
    fn circle_partly_off_canvas_is_clipped() {
        let mut canvas = Canvas::from_pixel(20, 20, BG);
        let source = RgbaImage::from_pixel(4, 4, FG);
        place_circular(&mut canvas, &source, 0, 0, 16);
        assert_eq!(canvas.get_pixel(0, 0), &FG);
        assert_eq!(canvas.get_pixel(19, 19), &BG);
    }
}
