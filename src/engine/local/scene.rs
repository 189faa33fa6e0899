use async_trait::async_trait;
use image::{Rgb, RgbImage};

use crate::{engine::local::Classifier, prelude::*};

const BUCKET_FRACTION_THRESHOLD: f64 = 0.25;
const GRADIENT_THRESHOLD: f64 = 18.0;

/// Coarse scene classifier over pixel statistics.
///
/// Stands in for a heavyweight object-recognition model: hue, luminance,
/// and gradient measures mapped to scene-level labels. Good enough to
/// key the location dataset, and loads nothing from disk.
#[must_use]
#[derive(Clone, Copy)]
pub struct SceneClassifier;

#[async_trait]
impl Classifier for SceneClassifier {
    async fn classify(&self, image: &[u8]) -> Result<Vec<String>> {
        let bytes = image.to_vec();
        tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let image = image::load_from_memory(&bytes).context("failed to decode the image")?;
            Ok(scene_labels(&image.to_rgb8()))
        })
        .await
        .context("the scene classification task failed")?
    }
}

fn scene_labels(image: &RgbImage) -> Vec<String> {
    let (width, height) = image.dimensions();
    let total = f64::from(width) * f64::from(height);
    if total == 0.0 {
        return Vec::new();
    }

    let mut night = 0_u64;
    let mut snow = 0_u64;
    let mut sky = 0_u64;
    let mut water = 0_u64;
    let mut vegetation = 0_u64;
    let mut sand = 0_u64;
    for pixel in image.pixels() {
        let [red, green, blue] = pixel.0;
        let (red, green, blue) = (f64::from(red), f64::from(green), f64::from(blue));
        let luminance = luminance(pixel);
        let maximum = red.max(green).max(blue);
        let saturation =
            if maximum > 0.0 { (maximum - red.min(green).min(blue)) / maximum } else { 0.0 };
        if luminance < 40.0 {
            night += 1;
        } else if saturation < 0.12 && luminance > 190.0 {
            snow += 1;
        } else if blue > red + 16.0 && blue > green + 8.0 {
            if luminance > 150.0 {
                sky += 1;
            } else {
                water += 1;
            }
        } else if green > red + 10.0 && green > blue + 10.0 {
            vegetation += 1;
        } else if red > 150.0 && green > 110.0 && blue < 110.0 {
            sand += 1;
        }
    }

    let mut buckets = [
        (night, &["night"][..]),
        (snow, &["snow", "mountain"][..]),
        (sky, &["sky"][..]),
        (water, &["water", "coast"][..]),
        (vegetation, &["vegetation", "forest"][..]),
        (sand, &["sand", "desert"][..]),
    ];
    buckets.sort_by(|lhs, rhs| rhs.0.cmp(&lhs.0));

    #[allow(clippy::cast_precision_loss)]
    let mut labels: Vec<String> = buckets
        .iter()
        .filter(|(count, _)| (*count as f64) / total > BUCKET_FRACTION_THRESHOLD)
        .flat_map(|(_, names)| names.iter().map(ToString::to_string))
        .collect();
    if mean_gradient(image) > GRADIENT_THRESHOLD {
        labels.push("urban".to_string());
        labels.push("street".to_string());
    }
    labels
}

/// Mean absolute horizontal luminance difference, a cheap edge measure.
fn mean_gradient(image: &RgbImage) -> f64 {
    let (width, height) = image.dimensions();
    if width < 2 {
        return 0.0;
    }
    let mut sum = 0.0;
    for y in 0..height {
        for x in 1..width {
            sum += (luminance(image.get_pixel(x, y)) - luminance(image.get_pixel(x - 1, y))).abs();
        }
    }
    sum / (f64::from(width - 1) * f64::from(height))
}

fn luminance(pixel: &Rgb<u8>) -> f64 {
    let [red, green, blue] = pixel.0;
    0.2126 * f64::from(red) + 0.7152 * f64::from(green) + 0.0722 * f64::from(blue)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::ImageFormat;

    use super::*;

    fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png)?;
        Ok(bytes.into_inner())
    }

    #[test]
    fn greenery_is_vegetation_ok() {
        let image = RgbImage::from_pixel(32, 32, Rgb([60, 180, 80]));
        let labels = scene_labels(&image);
        assert!(labels.contains(&"vegetation".to_string()));
        assert!(labels.contains(&"forest".to_string()));
    }

    #[test]
    fn dark_blue_is_water_ok() {
        let image = RgbImage::from_pixel(32, 32, Rgb([70, 70, 220]));
        let labels = scene_labels(&image);
        assert!(labels.contains(&"water".to_string()));
    }

    #[test]
    fn bright_desaturated_is_snow_ok() {
        let image = RgbImage::from_pixel(32, 32, Rgb([240, 240, 240]));
        let labels = scene_labels(&image);
        assert!(labels.contains(&"snow".to_string()));
    }

    #[test]
    fn checkerboard_is_urban_ok() {
        let image = RgbImage::from_fn(
            32,
            32,
            |x, y| if (x + y) % 2 == 0 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) },
        );
        let labels = scene_labels(&image);
        assert!(labels.contains(&"urban".to_string()));
    }

    #[tokio::test]
    async fn classify_decodes_encoded_image_ok() -> Result {
        let bytes = encode_png(&RgbImage::from_pixel(16, 16, Rgb([60, 180, 80])))?;
        let labels = SceneClassifier.classify(&bytes).await?;
        assert!(labels.contains(&"vegetation".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn classify_rejects_garbage_ok() {
        assert!(SceneClassifier.classify(b"not an image").await.is_err());
    }
}
