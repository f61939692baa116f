use image::{GrayImage, imageops};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::descriptor::{DescriptorError, DescriptorSet, Metric};
use crate::extract::FeatureExtractor;
use crate::extract::keypoints;

const PATCH_RADIUS: i32 = 15;
const DESCRIPTOR_BYTES: usize = 32;
const FAST_THRESHOLD: u8 = 20;
const PATTERN_SEED: u64 = 0x0b_5eed;

/// FAST corners described by 256 binary intensity tests (BRIEF), compared
/// by Hamming distance.
pub struct OrbExtractor {
    max_features: usize,
    pattern: Vec<[(i32, i32); 2]>,
}

impl OrbExtractor {
    pub fn new(max_features: usize) -> Self {
        // Fixed seed: every run must test the same pixel pairs.
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let pattern = (0..DESCRIPTOR_BYTES * 8)
            .map(|_| {
                let mut point = || {
                    (
                        rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS),
                        rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS),
                    )
                };
                [point(), point()]
            })
            .collect();
        Self {
            max_features,
            pattern,
        }
    }
}

impl FeatureExtractor for OrbExtractor {
    fn metric(&self) -> Metric {
        Metric::Hamming
    }

    fn extract(&self, image: &GrayImage) -> Result<DescriptorSet, DescriptorError> {
        let keypoints = keypoints::detect(
            image,
            FAST_THRESHOLD,
            PATCH_RADIUS as u32 + 1,
            self.max_features,
        );
        let smoothed = imageops::blur(image, 2.0);
        let sample = |x: i32, y: i32| smoothed.get_pixel(x as u32, y as u32).0[0];

        let mut data = Vec::with_capacity(keypoints.len() * DESCRIPTOR_BYTES);
        for kp in &keypoints {
            let (cx, cy) = (kp.x as i32, kp.y as i32);
            let mut descriptor = [0u8; DESCRIPTOR_BYTES];
            for (bit, [(ax, ay), (bx, by)]) in self.pattern.iter().enumerate() {
                if sample(cx + ax, cy + ay) < sample(cx + bx, cy + by) {
                    descriptor[bit / 8] |= 1 << (bit % 8);
                }
            }
            data.extend_from_slice(&descriptor);
        }
        DescriptorSet::binary(DESCRIPTOR_BYTES, data)
    }
}
