use image::GrayImage;
use std::f32::consts::PI;

use crate::core::descriptor::{DescriptorError, DescriptorSet, Metric};
use crate::extract::FeatureExtractor;
use crate::extract::keypoints::{self, Keypoint};

const GRID: usize = 4;

/// Central-difference gradient, sampled at interior pixels only.
fn gradient(image: &GrayImage, x: u32, y: u32) -> (f32, f32) {
    let at = |x: u32, y: u32| f32::from(image.get_pixel(x, y).0[0]);
    (at(x + 1, y) - at(x - 1, y), at(x, y + 1) - at(x, y - 1))
}

/// Top-left pixel of a `patch`-wide window centred on `kp`.
fn origin(kp: &Keypoint, patch: u32) -> (u32, u32) {
    (kp.x - patch / 2, kp.y - patch / 2)
}

fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// 4x4 cells of 8-bin gradient orientation histograms over a 16x16 patch,
/// giving 128-dimensional float descriptors.
pub struct SiftExtractor {
    max_features: usize,
}

impl SiftExtractor {
    const PATCH: u32 = 16;
    const BINS: usize = 8;
    const FAST_THRESHOLD: u8 = 15;
    const CLIP: f32 = 0.2;

    pub fn new(max_features: usize) -> Self {
        Self { max_features }
    }

    fn describe(image: &GrayImage, kp: &Keypoint, out: &mut Vec<f32>) {
        let cell = Self::PATCH as usize / GRID;
        let mut histogram = [0.0f32; GRID * GRID * Self::BINS];
        let (ox, oy) = origin(kp, Self::PATCH);

        for py in 0..Self::PATCH {
            for px in 0..Self::PATCH {
                let (dx, dy) = gradient(image, ox + px, oy + py);
                let magnitude = (dx * dx + dy * dy).sqrt();
                if magnitude == 0.0 {
                    continue;
                }
                let angle = dy.atan2(dx) + PI;
                let bin = ((angle / (2.0 * PI) * Self::BINS as f32) as usize).min(Self::BINS - 1);
                let c = (py as usize / cell) * GRID + px as usize / cell;
                histogram[c * Self::BINS + bin] += magnitude;
            }
        }

        normalize(&mut histogram);
        histogram.iter_mut().for_each(|v| *v = v.min(Self::CLIP));
        normalize(&mut histogram);
        out.extend_from_slice(&histogram);
    }
}

impl FeatureExtractor for SiftExtractor {
    fn metric(&self) -> Metric {
        Metric::Euclidean
    }

    fn extract(&self, image: &GrayImage) -> Result<DescriptorSet, DescriptorError> {
        let keypoints = keypoints::detect(
            image,
            Self::FAST_THRESHOLD,
            Self::PATCH / 2 + 1,
            self.max_features,
        );
        let mut data = Vec::with_capacity(keypoints.len() * GRID * GRID * Self::BINS);
        for kp in &keypoints {
            Self::describe(image, kp, &mut data);
        }
        DescriptorSet::float(GRID * GRID * Self::BINS, data)
    }
}

/// 4x4 cells of summed gradient responses (dx, dy, |dx|, |dy|) over a 20x20
/// patch, giving 64-dimensional float descriptors.
pub struct SurfExtractor {
    max_features: usize,
}

impl SurfExtractor {
    const PATCH: u32 = 20;
    const FAST_THRESHOLD: u8 = 10;

    pub fn new(max_features: usize) -> Self {
        Self { max_features }
    }

    fn describe(image: &GrayImage, kp: &Keypoint, out: &mut Vec<f32>) {
        let cell = Self::PATCH as usize / GRID;
        let mut sums = [0.0f32; GRID * GRID * 4];
        let (ox, oy) = origin(kp, Self::PATCH);

        for py in 0..Self::PATCH {
            for px in 0..Self::PATCH {
                let (dx, dy) = gradient(image, ox + px, oy + py);
                let c = ((py as usize / cell) * GRID + px as usize / cell) * 4;
                sums[c] += dx;
                sums[c + 1] += dy;
                sums[c + 2] += dx.abs();
                sums[c + 3] += dy.abs();
            }
        }

        normalize(&mut sums);
        out.extend_from_slice(&sums);
    }
}

impl FeatureExtractor for SurfExtractor {
    fn metric(&self) -> Metric {
        Metric::Euclidean
    }

    fn extract(&self, image: &GrayImage) -> Result<DescriptorSet, DescriptorError> {
        let keypoints = keypoints::detect(
            image,
            Self::FAST_THRESHOLD,
            Self::PATCH / 2 + 1,
            self.max_features,
        );
        let mut data = Vec::with_capacity(keypoints.len() * GRID * GRID * 4);
        for kp in &keypoints {
            Self::describe(image, kp, &mut data);
        }
        DescriptorSet::float(GRID * GRID * 4, data)
    }
}
