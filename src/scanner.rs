use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::cancel::CancellationToken;
use crate::core::descriptor::DescriptorSet;
use crate::extract::FeatureExtractor;

pub const DEFAULT_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"];

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    #[error("Operation cancelled")]
    Cancelled,
}

/// A successfully described source image.
#[derive(Debug, Clone)]
pub struct Item {
    pub path: PathBuf,
    pub descriptors: DescriptorSet,
}

/// Image files under `dir` in the order the file system lists them. Only the
/// top level is read unless `recursive` is set.
pub fn scan_directory(dir: &Path, recursive: bool, extensions: &[String]) -> Result<Vec<PathBuf>, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::InvalidPath {
            path: dir.to_string_lossy().to_string(),
        });
    }

    let allowed: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();
    let walker = if recursive {
        WalkDir::new(dir)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let mut images = Vec::new();
    for entry in walker.follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
            if allowed.contains(&ext.to_lowercase()) {
                images.push(path.to_path_buf());
            }
        }
    }
    Ok(images)
}

/// Extract descriptors for every path in parallel, keeping input order.
///
/// Images that cannot be opened or decoded are logged and left out; the
/// clustering core only ever sees successfully described items.
/// `on_progress` is called once per path, from worker threads.
pub fn ingest<F>(
    paths: Vec<PathBuf>,
    extractor: &dyn FeatureExtractor,
    token: &CancellationToken,
    on_progress: F,
) -> Result<Vec<Item>, ScanError>
where
    F: Fn(&Path) + Sync,
{
    let described: Vec<Option<Item>> = paths
        .into_par_iter()
        .map(|path| {
            if token.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            let result = extractor.extract_path(&path);
            on_progress(&path);
            match result {
                Ok(descriptors) => Ok(Some(Item { path, descriptors })),
                Err(e) => {
                    log::warn!("Failed to load image at {}: {}", path.display(), e);
                    Ok(None)
                }
            }
        })
        .collect::<Result<_, ScanError>>()?;

    Ok(described.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Detector;
    use image::{GrayImage, Luma};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn extensions() -> Vec<String> {
        DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    }

    fn write_square(path: &Path, from: u32) {
        GrayImage::from_fn(200, 200, |x, y| {
            if (from..from + 40).contains(&x) && (from..from + 40).contains(&y) {
                Luma([235])
            } else {
                Luma([15])
            }
        })
        .save(path)
        .unwrap();
    }

    #[test]
    fn test_scan_filters_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.png"), b"").unwrap();
        fs::write(temp_dir.path().join("b.JPG"), b"").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"").unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        fs::write(temp_dir.path().join("nested").join("c.tiff"), b"").unwrap();

        let mut flat = scan_directory(temp_dir.path(), false, &extensions()).unwrap();
        flat.sort();
        assert_eq!(
            flat,
            vec![temp_dir.path().join("a.png"), temp_dir.path().join("b.JPG")]
        );

        let deep = scan_directory(temp_dir.path(), true, &extensions()).unwrap();
        assert_eq!(deep.len(), 3);
        assert!(deep.contains(&temp_dir.path().join("nested").join("c.tiff")));
    }

    #[test]
    fn test_scan_rejects_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(matches!(
            scan_directory(&missing, false, &extensions()),
            Err(ScanError::InvalidPath { .. })
        ));

        let file = temp_dir.path().join("file.png");
        fs::write(&file, b"").unwrap();
        assert!(scan_directory(&file, false, &extensions()).is_err());
    }

    #[test]
    fn test_ingest_keeps_order_and_skips_broken_images() {
        let temp_dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..4)
            .map(|i| temp_dir.path().join(format!("img{i}.png")))
            .collect();
        for (i, path) in paths.iter().enumerate() {
            if i == 2 {
                fs::write(path, b"corrupt").unwrap();
            } else {
                write_square(path, 40 + 20 * i as u32);
            }
        }

        let calls = AtomicUsize::new(0);
        let extractor = Detector::Orb.extractor(100);
        let items = ingest(paths.clone(), extractor.as_ref(), &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        let got: Vec<&PathBuf> = items.iter().map(|item| &item.path).collect();
        assert_eq!(got, vec![&paths[0], &paths[1], &paths[3]]);
        assert_eq!(calls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_ingest_cancelled() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("one.png");
        write_square(&path, 60);

        let token = CancellationToken::new();
        token.cancel();
        let extractor = Detector::Orb.extractor(100);
        assert!(matches!(
            ingest(vec![path], extractor.as_ref(), &token, |_| {}),
            Err(ScanError::Cancelled)
        ));
    }
}
