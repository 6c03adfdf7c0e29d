use image::{imageops, RgbaImage};

use crate::assets::ImageLoader;
use crate::error::ComposeResult;

/// The mutable pixel buffer a single render pass owns.
pub type Canvas = RgbaImage;

/// Copies `background` into a fresh canvas and draws each overlay over it
/// (source-over, anchored at the origin, clipped to the canvas).
pub fn composite(background: &RgbaImage, overlays: &[RgbaImage]) -> Canvas {
    let mut canvas = Canvas::new(background.width(), background.height());
    imageops::replace(&mut canvas, background, 0, 0);
    for overlay in overlays {
        imageops::overlay(&mut canvas, overlay, 0, 0);
    }
    canvas
}

/// Loads the background and every overlay, then composites them.
///
/// Any failed load aborts the whole composite; the error names the reference.
pub fn compose_base<L: ImageLoader + ?Sized>(
    loader: &L,
    background: &str,
    overlays: &[String],
) -> ComposeResult<Canvas> {
    let background = loader.load_image(background)?;
    let overlays = overlays
        .iter()
        .map(|reference| loader.load_image(reference))
        .collect::<ComposeResult<Vec<_>>>()?;
    Ok(composite(&background, &overlays))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComposeError;
    use image::Rgba;
    use std::collections::HashMap;

    struct MemoryLoader(HashMap<&'static str, RgbaImage>);

    impl ImageLoader for MemoryLoader {
        fn load_image(&self, reference: &str) -> ComposeResult<RgbaImage> {
            self.0
                .get(reference)
                .cloned()
                .ok_or_else(|| ComposeError::fetch(reference, "not in memory"))
        }
    }

    const BG: Rgba<u8> = Rgba([20, 40, 60, 255]);

    #[test]
    fn canvas_matches_background_bounds_and_pixels() {
        let background = RgbaImage::from_pixel(16, 9, BG);
        let canvas = composite(&background, &[]);
        assert_eq!(canvas.dimensions(), (16, 9));
        assert_eq!(canvas, background);
    }

    #[test]
    fn opaque_overlay_replaces_and_transparent_keeps() {
        let background = RgbaImage::from_pixel(4, 4, BG);
        let mut overlay = RgbaImage::new(4, 4);
        overlay.put_pixel(1, 1, Rgba([255, 0, 0, 255]));
        let canvas = composite(&background, &[overlay]);
        assert_eq!(canvas.get_pixel(1, 1), &Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(0, 0), &BG);
    }

    #[test]
    fn later_overlays_sit_on_top() {
        let background = RgbaImage::from_pixel(2, 2, BG);
        let red = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let blue = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 255, 255]));
        let canvas = composite(&background, &[red, blue]);
        assert_eq!(canvas.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(canvas.get_pixel(1, 1), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn oversized_overlay_is_clipped_and_small_overlay_leaves_rest() {
        let background = RgbaImage::from_pixel(3, 3, BG);
        let big = RgbaImage::from_pixel(10, 10, Rgba([0, 255, 0, 255]));
        assert_eq!(composite(&background, &[big]).dimensions(), (3, 3));

        let small = RgbaImage::from_pixel(1, 1, Rgba([0, 255, 0, 255]));
        let canvas = composite(&background, &[small]);
        assert_eq!(canvas.get_pixel(2, 2), &BG);
    }

    #[test]
    fn half_transparent_overlay_blends() {
        let background = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        let overlay = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 128]));
        let pixel = *composite(&background, &[overlay]).get_pixel(0, 0);
        assert!(pixel[0] > 100 && pixel[0] < 160, "got {pixel:?}");
        assert_eq!(pixel[3], 255);
    }

    #[test]
    fn failing_overlay_aborts_with_its_reference() {
        let mut images = HashMap::new();
        images.insert("bg.jpg", RgbaImage::from_pixel(2, 2, BG));
        let loader = MemoryLoader(images);
        let err = compose_base(&loader, "bg.jpg", &["frame.png".to_owned()]).unwrap_err();
        assert!(err.to_string().contains("frame.png"));
    }
}
