//! Feature extraction for the clustering core.
//!
//! Images are decoded, shrunk, converted to grayscale and blurred, then one
//! detector variant turns them into a [`DescriptorSet`]. The variant is picked
//! once per run; its metric holds for every item of that run.

pub mod gradient;
pub mod keypoints;
pub mod orb;

use clap::ValueEnum;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageReader};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::core::descriptor::{DescriptorError, DescriptorSet, Metric};
use crate::core::engine::ClusterOptions;
use crate::extract::gradient::{SiftExtractor, SurfExtractor};
use crate::extract::orb::OrbExtractor;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),
}

pub trait FeatureExtractor: Send + Sync {
    fn metric(&self) -> Metric;

    /// Describe an already preprocessed image. No features is not an error:
    /// the result is an empty set.
    fn extract(&self, image: &GrayImage) -> Result<DescriptorSet, DescriptorError>;

    fn extract_path(&self, path: &Path) -> Result<DescriptorSet, ExtractError> {
        let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        Ok(self.extract(&preprocess(&image))?)
    }
}

/// Halve the image, drop colour and apply a light Gaussian blur.
pub fn preprocess(image: &DynamicImage) -> GrayImage {
    let width = (image.width() / 2).max(1);
    let height = (image.height() / 2).max(1);
    let gray = image
        .resize_exact(width, height, FilterType::Triangle)
        .to_luma8();
    imageops::blur(&gray, 0.8)
}

/// Detector variants. Binary ORB descriptors use Hamming distance; SIFT and
/// SURF style descriptors are floating point and use Euclidean distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Detector {
    Orb,
    Surf,
    Sift,
}

impl Detector {
    pub const ALL: [Detector; 3] = [Detector::Orb, Detector::Surf, Detector::Sift];

    pub fn metric(self) -> Metric {
        match self {
            Detector::Orb => Metric::Hamming,
            Detector::Surf | Detector::Sift => Metric::Euclidean,
        }
    }

    /// Thresholds tuned per detector: richer float descriptors produce far
    /// more good matches between related photos.
    pub fn default_options(self) -> ClusterOptions {
        match self {
            Detector::Orb => ClusterOptions::new(20, 0.75),
            Detector::Surf => ClusterOptions::new(100, 0.6),
            Detector::Sift => ClusterOptions::new(80, 0.6),
        }
    }

    pub fn default_max_features(self) -> usize {
        match self {
            Detector::Orb => 500,
            Detector::Surf | Detector::Sift => 1000,
        }
    }

    pub fn extractor(self, max_features: usize) -> Box<dyn FeatureExtractor> {
        match self {
            Detector::Orb => Box::new(OrbExtractor::new(max_features)),
            Detector::Surf => Box::new(SurfExtractor::new(max_features)),
            Detector::Sift => Box::new(SiftExtractor::new(max_features)),
        }
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detector::Orb => write!(f, "ORB"),
            Detector::Surf => write!(f, "SURF"),
            Detector::Sift => write!(f, "SIFT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn square_photo() -> RgbImage {
        RgbImage::from_fn(200, 200, |x, y| {
            if (80..120).contains(&x) && (80..120).contains(&y) {
                Rgb([240, 230, 220])
            } else {
                Rgb([10, 20, 30])
            }
        })
    }

    #[test]
    fn test_preprocess_halves_and_grays() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(64, 31));
        let out = preprocess(&image);
        assert_eq!(out.dimensions(), (32, 15));

        let tiny = DynamicImage::ImageRgb8(RgbImage::new(1, 1));
        assert_eq!(preprocess(&tiny).dimensions(), (1, 1));
    }

    #[test]
    fn test_extractor_matches_detector_metric() {
        for detector in Detector::ALL {
            let extractor = detector.extractor(detector.default_max_features());
            assert_eq!(extractor.metric(), detector.metric());
            assert!(detector.default_options().validate().is_ok());
        }
    }

    #[test]
    fn test_extract_path_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("square.png");
        square_photo().save(&path).unwrap();

        for detector in Detector::ALL {
            let set = detector.extractor(100).extract_path(&path).unwrap();
            assert_eq!(set.metric(), detector.metric());
            assert!(!set.is_empty(), "{} found no features", detector);
        }
    }

    #[test]
    fn test_extract_path_rejects_non_image() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(Detector::Orb.extractor(100).extract_path(&path).is_err());
    }

    #[test]
    fn test_detector_serde_names() {
        assert_eq!(serde_json::to_string(&Detector::Sift).unwrap(), "\"sift\"");
        let parsed: Detector = serde_json::from_str("\"surf\"").unwrap();
        assert_eq!(parsed, Detector::Surf);
    }
}
