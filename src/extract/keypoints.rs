use image::GrayImage;

/// A detected corner, in preprocessed-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keypoint {
    pub x: u32,
    pub y: u32,
    pub score: u32,
}

/// Bresenham circle of radius 3, clockwise from the top.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Contiguous circle pixels needed for a corner (FAST-9).
const ARC_LENGTH: usize = 9;

/// FAST-9 corners with 3x3 non-maximum suppression.
///
/// Only pixels at least `margin` away from every edge are considered, so
/// callers can sample a patch of that radius around each keypoint. The
/// strongest `max_features` are returned, ordered by score and then by
/// position, which keeps the output deterministic.
pub fn detect(image: &GrayImage, threshold: u8, margin: u32, max_features: usize) -> Vec<Keypoint> {
    let (width, height) = image.dimensions();
    let margin = margin.max(3);
    if width <= 2 * margin || height <= 2 * margin {
        return Vec::new();
    }

    let mut scores = vec![0u32; (width * height) as usize];
    for y in margin..height - margin {
        for x in margin..width - margin {
            scores[(y * width + x) as usize] = corner_score(image, x, y, threshold);
        }
    }

    let mut keypoints = Vec::new();
    for y in margin..height - margin {
        for x in margin..width - margin {
            let score = scores[(y * width + x) as usize];
            if score > 0 && is_local_maximum(&scores, width, x, y, score) {
                keypoints.push(Keypoint { x, y, score });
            }
        }
    }

    keypoints.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.y.cmp(&b.y))
            .then(a.x.cmp(&b.x))
    });
    keypoints.truncate(max_features);
    keypoints
}

/// Zero when the pixel is not a corner, otherwise the summed contrast of
/// the circle pixels beyond the threshold.
fn corner_score(image: &GrayImage, x: u32, y: u32, threshold: u8) -> u32 {
    let center = i32::from(image.get_pixel(x, y).0[0]);
    let t = i32::from(threshold);

    let mut brighter = [false; 16];
    let mut darker = [false; 16];
    let mut bright_sum = 0u32;
    let mut dark_sum = 0u32;
    for (i, (dx, dy)) in CIRCLE.iter().enumerate() {
        let v = i32::from(image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32).0[0]);
        if v > center + t {
            brighter[i] = true;
            bright_sum += (v - center - t) as u32;
        } else if v < center - t {
            darker[i] = true;
            dark_sum += (center - t - v) as u32;
        }
    }

    let mut score = 0;
    if longest_arc(&brighter) >= ARC_LENGTH {
        score = score.max(bright_sum);
    }
    if longest_arc(&darker) >= ARC_LENGTH {
        score = score.max(dark_sum);
    }
    score
}

fn longest_arc(flags: &[bool; 16]) -> usize {
    let mut best = 0;
    let mut run = 0;
    for i in 0..32 {
        if flags[i % 16] {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best.min(16)
}

fn is_local_maximum(scores: &[u32], width: u32, x: u32, y: u32, score: u32) -> bool {
    for ny in y - 1..=y + 1 {
        for nx in x - 1..=x + 1 {
            if (nx, ny) == (x, y) {
                continue;
            }
            let other = scores[(ny * width + nx) as usize];
            // Equal neighbours: the first in raster order wins.
            if other > score || (other == score && (ny, nx) < (y, x)) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
pub(crate) mod fixtures {
    use image::{GrayImage, Luma};

    /// Dark canvas with one bright axis-aligned square.
    pub fn square(size: u32, from: u32, to: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (from..to).contains(&x) && (from..to).contains(&y) {
                Luma([230])
            } else {
                Luma([20])
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::square;
    use super::*;
    use image::Luma;

    #[test]
    fn test_flat_image_has_no_corners() {
        let image = GrayImage::from_pixel(64, 64, Luma([128]));
        assert!(detect(&image, 20, 3, 100).is_empty());
    }

    #[test]
    fn test_square_corners_detected() {
        let image = square(100, 40, 60);
        let keypoints = detect(&image, 20, 16, 100);
        assert!(!keypoints.is_empty());
        for kp in &keypoints {
            assert!(kp.x >= 16 && kp.x < 84);
            assert!(kp.y >= 16 && kp.y < 84);
            // Every corner sits next to one of the square's four corners.
            let near = |v: u32| v.abs_diff(40) <= 2 || v.abs_diff(59) <= 2;
            assert!(near(kp.x) && near(kp.y), "unexpected corner at {:?}", kp);
        }
    }

    #[test]
    fn test_margin_excludes_border_features() {
        let image = square(100, 2, 20);
        let keypoints = detect(&image, 20, 16, 100);
        assert!(keypoints.iter().all(|kp| kp.x >= 16 && kp.y >= 16));
    }

    #[test]
    fn test_max_features_keeps_strongest() {
        let image = square(100, 40, 60);
        let all = detect(&image, 20, 16, 100);
        let capped = detect(&image, 20, 16, 1);
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0], all[0]);
    }

    #[test]
    fn test_longest_arc_wraps() {
        let mut flags = [false; 16];
        for i in (12..16).chain(0..5) {
            flags[i] = true;
        }
        assert_eq!(longest_arc(&flags), 9);
        assert_eq!(longest_arc(&[true; 16]), 16);
    }

    #[test]
    fn test_image_smaller_than_margin() {
        let image = square(20, 5, 10);
        assert!(detect(&image, 20, 16, 100).is_empty());
    }
}
