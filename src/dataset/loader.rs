//! Image Folder Loader
//!
//! Scans a `root/<class_name>/<image>` directory tree and decodes images
//! into the network's input layout.
//!
//! The training split defines the class registry (sorted directory names).
//! Validation and test splits are resolved through that registry and never
//! define their own ordering.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::model::labels::LabelRegistry;
use crate::utils::error::{PlantDoctorError, Result};
use crate::MIN_IMAGE_SIDE;

/// File extensions treated as images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

/// A single image sample with its label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index
    pub label: usize,
    /// Class name (the directory name, e.g. "Tomato_Early_blight")
    pub class_name: String,
}

/// One split of a class-per-directory image dataset
#[derive(Debug, Clone)]
pub struct ImageFolder {
    /// Root directory of the split
    pub root_dir: PathBuf,
    /// All samples, grouped by class in registry order
    pub samples: Vec<ImageSample>,
    registry: LabelRegistry,
}

impl ImageFolder {
    /// Scan a training split, deriving the label registry from it
    ///
    /// ```text
    /// root_dir/
    /// ├── Tomato_Early_blight/
    /// │   ├── image1.jpg
    /// │   └── image2.jpg
    /// └── Tomato_healthy/
    ///     └── ...
    /// ```
    pub fn scan<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref();
        let class_dirs = class_directories(root_dir)?;
        let registry = LabelRegistry::from_class_names(class_dirs)?;
        Self::scan_with_registry(root_dir, &registry)
    }

    /// Scan a validation or test split against an existing registry
    ///
    /// Every class directory must be known to the registry. Registry classes
    /// without a directory are allowed and simply have no samples.
    pub fn scan_with_registry<P: AsRef<Path>>(root_dir: P, registry: &LabelRegistry) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Scanning image folder: {:?}", root_dir);

        let class_dirs = class_directories(&root_dir)?;

        let mut samples = Vec::new();
        let mut by_label: Vec<(usize, String)> = Vec::with_capacity(class_dirs.len());
        for class_name in class_dirs {
            let label = registry.index(&class_name).ok_or_else(|| {
                PlantDoctorError::Dataset(format!(
                    "class directory '{}' in {:?} is not one of the {} training classes",
                    class_name,
                    root_dir,
                    registry.len()
                ))
            })?;
            by_label.push((label, class_name));
        }
        by_label.sort_by_key(|(label, _)| *label);

        for (label, class_name) in by_label {
            let class_dir = root_dir.join(&class_name);
            let files = image_files(&class_dir);
            if files.is_empty() {
                return Err(PlantDoctorError::Dataset(format!(
                    "class directory {:?} contains no images",
                    class_dir
                )));
            }

            debug!("Class '{}' (label {}): {} images", class_name, label, files.len());
            samples.extend(files.into_iter().map(|path| ImageSample {
                path,
                label,
                class_name: class_name.clone(),
            }));
        }

        info!("Found {} images in {:?}", samples.len(), root_dir);

        Ok(Self {
            root_dir,
            samples,
            registry: registry.clone(),
        })
    }

    /// Get the number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the split has no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of classes in the registry
    pub fn num_classes(&self) -> usize {
        self.registry.len()
    }

    /// The registry the samples were labelled with
    pub fn registry(&self) -> &LabelRegistry {
        &self.registry
    }

    /// Get statistics about the split
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            total_samples: self.samples.len(),
            num_classes: self.num_classes(),
            class_counts,
            class_names: self.registry.names().to_vec(),
        }
    }
}

/// Sorted names of the immediate subdirectories of `root`
fn class_directories(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Err(PlantDoctorError::Dataset(format!(
            "dataset directory does not exist: {:?}",
            root
        )));
    }

    let mut class_dirs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            match entry.file_name().to_str() {
                Some(name) => class_dirs.push(name.to_string()),
                None => {
                    return Err(PlantDoctorError::Dataset(format!(
                        "class directory name is not valid UTF-8: {:?}",
                        entry.path()
                    )))
                }
            }
        }
    }

    if class_dirs.is_empty() {
        return Err(PlantDoctorError::Dataset(format!(
            "no class directories found in {:?}",
            root
        )));
    }

    class_dirs.sort();
    Ok(class_dirs)
}

/// Image files directly inside `dir`, sorted by path
fn image_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_image_file(p))
        .collect();
    files.sort();
    files
}

/// Whether `path` has one of the supported image extensions
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Decode an RGB image and resize it to `size`×`size`
///
/// Rejects files that cannot be decoded, single-channel (luma) images and
/// images with a side shorter than `MIN_IMAGE_SIDE`. An alpha channel is
/// dropped.
pub fn load_rgb_image(path: &Path, size: u32) -> Result<RgbImage> {
    let img = ImageReader::open(path)
        .map_err(|e| PlantDoctorError::image_load(path, e.to_string()))?
        .with_guessed_format()
        .map_err(|e| PlantDoctorError::image_load(path, e.to_string()))?
        .decode()
        .map_err(|e| PlantDoctorError::image_load(path, e.to_string()))?;

    if matches!(
        img,
        DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
    ) {
        return Err(PlantDoctorError::image_load(
            path,
            "expected a 3-channel color image, got grayscale",
        ));
    }

    if img.width() < MIN_IMAGE_SIDE || img.height() < MIN_IMAGE_SIDE {
        return Err(PlantDoctorError::image_load(
            path,
            format!(
                "image is {}x{}, sides must be at least {} pixels",
                img.width(),
                img.height(),
                MIN_IMAGE_SIDE
            ),
        ));
    }

    Ok(img.resize_exact(size, size, FilterType::Triangle).to_rgb8())
}

/// Convert to CHW float data normalized to [0, 1]
pub fn to_chw(img: &RgbImage) -> Vec<f32> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let plane = width * height;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in img.enumerate_pixels() {
        let offset = y as usize * width + x as usize;
        data[offset] = pixel[0] as f32 / 255.0;
        data[plane + offset] = pixel[1] as f32 / 255.0;
        data[2 * plane + offset] = pixel[2] as f32 / 255.0;
    }

    data
}

/// Statistics about one split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_counts: Vec<usize>,
    pub class_names: Vec<String>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("  Total samples: {}", self.total_samples);
        println!("  Number of classes: {}", self.num_classes);
        println!("\n  Samples per class:");

        for (idx, (name, count)) in self.class_names.iter().zip(&self.class_counts).enumerate() {
            let bar_len = if self.total_samples > 0 {
                (*count as f32 / self.total_samples as f32 * 40.0) as usize
            } else {
                0
            };
            println!("    {:3}. {:45} {:5} {}", idx, name, count, "█".repeat(bar_len));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb};
    use tempfile::TempDir;

    /// Write a solid-colour RGB png
    pub(crate) fn write_rgb(path: &Path, size: u32, color: [u8; 3]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(size, size, Rgb(color)).save(path).unwrap();
    }

    /// Split with `per_class` images for each `(class, colour)` pair
    pub(crate) fn make_split(root: &Path, classes: &[(&str, [u8; 3])], per_class: usize) {
        for (class, color) in classes {
            for i in 0..per_class {
                write_rgb(&root.join(class).join(format!("img_{}.png", i)), 16, *color);
            }
        }
    }

    #[test]
    fn test_scan_assigns_sorted_indices() {
        let dir = TempDir::new().unwrap();
        make_split(
            dir.path(),
            &[("Tomato_healthy", [0, 255, 0]), ("Tomato_Early_blight", [120, 80, 0])],
            3,
        );
        std::fs::write(dir.path().join("Tomato_healthy/notes.txt"), "skip me").unwrap();

        let folder = ImageFolder::scan(dir.path()).unwrap();

        assert_eq!(folder.len(), 6);
        assert_eq!(folder.registry().name(0), Some("Tomato_Early_blight"));
        assert_eq!(folder.registry().name(1), Some("Tomato_healthy"));
        for sample in &folder.samples {
            assert_eq!(folder.registry().index(&sample.class_name), Some(sample.label));
        }
    }

    #[test]
    fn test_empty_class_directory_is_dataset_error() {
        let dir = TempDir::new().unwrap();
        make_split(dir.path(), &[("Potato___healthy", [0, 200, 0])], 2);
        std::fs::create_dir_all(dir.path().join("Potato___Late_blight")).unwrap();

        let err = ImageFolder::scan(dir.path()).unwrap_err();
        assert!(matches!(err, PlantDoctorError::Dataset(_)));
    }

    #[test]
    fn test_no_classes_is_dataset_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            ImageFolder::scan(dir.path()),
            Err(PlantDoctorError::Dataset(_))
        ));
        assert!(matches!(
            ImageFolder::scan(dir.path().join("missing")),
            Err(PlantDoctorError::Dataset(_))
        ));
    }

    #[test]
    fn test_scan_with_registry_reuses_training_indices() {
        let dir = TempDir::new().unwrap();
        let registry = LabelRegistry::from_class_names(["b_class", "a_class"]).unwrap();
        make_split(dir.path(), &[("a_class", [1, 1, 1]), ("b_class", [2, 2, 2])], 1);

        let folder = ImageFolder::scan_with_registry(dir.path(), &registry).unwrap();
        let a = folder.samples.iter().find(|s| s.class_name == "a_class").unwrap();
        assert_eq!(a.label, 1);
        assert_eq!(folder.stats().class_counts, vec![1, 1]);
    }

    #[test]
    fn test_scan_with_registry_rejects_unknown_class() {
        let dir = TempDir::new().unwrap();
        let registry = LabelRegistry::from_class_names(["a_class"]).unwrap();
        make_split(dir.path(), &[("a_class", [1, 1, 1]), ("c_class", [3, 3, 3])], 1);

        assert!(matches!(
            ImageFolder::scan_with_registry(dir.path(), &registry),
            Err(PlantDoctorError::Dataset(_))
        ));
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("leaf.JPG")));
        assert!(is_image_file(Path::new("leaf.webp")));
        assert!(!is_image_file(Path::new("leaf.txt")));
        assert!(!is_image_file(Path::new("leaf")));
    }

    #[test]
    fn test_load_rgb_image_resizes_and_normalizes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaf.png");
        write_rgb(&path, 40, [255, 0, 51]);

        let img = load_rgb_image(&path, 24).unwrap();
        assert_eq!(img.dimensions(), (24, 24));

        let data = to_chw(&img);
        assert_eq!(data.len(), 3 * 24 * 24);
        assert!((data[0] - 1.0).abs() < 0.005);
        assert!(data[24 * 24].abs() < 0.005);
        assert!((data[2 * 24 * 24] - 0.2).abs() < 0.005);
        assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_load_rejects_tiny_grayscale_and_garbage() {
        let dir = TempDir::new().unwrap();

        let tiny = dir.path().join("tiny.png");
        write_rgb(&tiny, 1, [10, 20, 30]);
        assert!(matches!(load_rgb_image(&tiny, 32), Err(PlantDoctorError::ImageLoad { .. })));

        let gray = dir.path().join("gray.png");
        GrayImage::from_pixel(32, 32, Luma([128])).save(&gray).unwrap();
        assert!(matches!(load_rgb_image(&gray, 32), Err(PlantDoctorError::ImageLoad { .. })));

        let garbage = dir.path().join("garbage.png");
        std::fs::write(&garbage, b"not an image").unwrap();
        assert!(matches!(load_rgb_image(&garbage, 32), Err(PlantDoctorError::ImageLoad { .. })));

        let missing = dir.path().join("missing.png");
        assert!(matches!(load_rgb_image(&missing, 32), Err(PlantDoctorError::ImageLoad { .. })));
    }
}
