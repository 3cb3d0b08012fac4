//! Burn batching over an image folder
//!
//! [`ImageFolderDataset`] decodes a sample only when a batch asks for it and
//! returns the load error instead of skipping the image; [`CropBatcher`]
//! implements Burn's `Batcher` to turn decoded items into tensors.

use std::marker::PhantomData;
use std::path::PathBuf;

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::dataset::augmentation::Augmenter;
use crate::dataset::loader::{load_rgb_image, to_chw, ImageFolder, ImageSample};
use crate::utils::error::Result;

/// A single decoded image ready for batching
#[derive(Clone, Debug)]
pub struct CropItem {
    /// Image data as flattened CHW float array [3 * H * W], values in [0, 1]
    pub image: Vec<f32>,
    /// Class label index
    pub label: usize,
    /// Image path (for logging and per-sample reports)
    pub path: PathBuf,
}

/// A batch of images with labels
#[derive(Clone, Debug)]
pub struct CropBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// One-hot labels with shape [batch_size, num_classes]
    pub one_hot: Tensor<B, 2>,
    /// Class indices with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
    /// Source path of every row
    pub paths: Vec<PathBuf>,
}

impl<B: Backend> CropBatch<B> {
    /// Number of images in the batch
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Lazily decoding dataset over the samples of one split
#[derive(Debug, Clone)]
pub struct ImageFolderDataset {
    samples: Vec<ImageSample>,
    image_size: usize,
}

impl ImageFolderDataset {
    /// Create a new dataset from a list of samples
    pub fn new(samples: Vec<ImageSample>, image_size: usize) -> Self {
        Self { samples, image_size }
    }

    /// Create a dataset over every sample of a scanned split
    pub fn from_folder(folder: &ImageFolder, image_size: usize) -> Self {
        Self::new(folder.samples.clone(), image_size)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Target side length
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Decode one item, surfacing the load error
    ///
    /// The image is resized first, then augmented when `augment` is given,
    /// then rescaled to [0, 1].
    pub fn try_get(
        &self,
        index: usize,
        augment: Option<(&Augmenter, &mut ChaCha8Rng)>,
    ) -> Option<Result<CropItem>> {
        let sample = self.samples.get(index)?;

        Some(load_rgb_image(&sample.path, self.image_size as u32).map(|img| {
            let img = match augment {
                Some((augmenter, rng)) => augmenter.augment(&img, rng),
                None => img,
            };
            CropItem {
                image: to_chw(&img),
                label: sample.label,
                path: sample.path.clone(),
            }
        }))
    }
}

/// Batcher turning decoded items into image, one-hot and target tensors
#[derive(Clone, Debug)]
pub struct CropBatcher<B: Backend> {
    image_size: usize,
    num_classes: usize,
    _backend: PhantomData<B>,
}

impl<B: Backend> CropBatcher<B> {
    pub fn new(image_size: usize, num_classes: usize) -> Self {
        Self {
            image_size,
            num_classes,
            _backend: PhantomData,
        }
    }
}

impl<B: Backend> Batcher<B, CropItem, CropBatch<B>> for CropBatcher<B> {
    fn batch(&self, items: Vec<CropItem>, device: &B::Device) -> CropBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;

        let mut images_data = Vec::with_capacity(batch_size * 3 * size * size);
        let mut one_hot_data = vec![0.0f32; batch_size * self.num_classes];
        let mut targets_data = Vec::with_capacity(batch_size);
        let mut paths = Vec::with_capacity(batch_size);

        for (row, item) in items.into_iter().enumerate() {
            images_data.extend(item.image);
            one_hot_data[row * self.num_classes + item.label] = 1.0;
            targets_data.push(item.label as i64);
            paths.push(item.path);
        }

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, size, size]),
            device,
        );
        let one_hot = Tensor::<B, 2>::from_floats(
            TensorData::new(one_hot_data, [batch_size, self.num_classes]),
            device,
        );
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        CropBatch {
            images,
            one_hot,
            targets,
            paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::loader::tests::make_split;
    use crate::utils::error::PlantDoctorError;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    #[test]
    fn test_dataset_len_and_try_get() {
        let dir = TempDir::new().unwrap();
        make_split(dir.path(), &[("a", [255, 0, 0]), ("b", [0, 0, 255])], 2);
        let folder = ImageFolder::scan(dir.path()).unwrap();

        let dataset = ImageFolderDataset::from_folder(&folder, 8);
        assert_eq!(dataset.len(), 4);

        let item = dataset.try_get(3, None).unwrap().unwrap();
        assert_eq!(item.label, 1);
        assert_eq!(item.image.len(), 3 * 8 * 8);
        assert!(dataset.try_get(4, None).is_none());
    }

    #[test]
    fn test_try_get_reports_bad_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"nope").unwrap();

        let dataset = ImageFolderDataset::new(
            vec![ImageSample {
                path,
                label: 0,
                class_name: "a".to_string(),
            }],
            8,
        );

        let err = dataset.try_get(0, None).unwrap().unwrap_err();
        assert!(matches!(err, PlantDoctorError::ImageLoad { .. }));
    }

    #[test]
    fn test_batcher_shapes_and_one_hot() {
        let device = Default::default();
        let batcher = CropBatcher::<TestBackend>::new(4, 3);

        let items = vec![
            CropItem {
                image: vec![0.5; 3 * 4 * 4],
                label: 2,
                path: PathBuf::from("x.png"),
            },
            CropItem {
                image: vec![0.25; 3 * 4 * 4],
                label: 0,
                path: PathBuf::from("y.png"),
            },
        ];

        let batch = batcher.batch(items, &device);

        assert_eq!(batch.images.dims(), [2, 3, 4, 4]);
        assert_eq!(batch.one_hot.dims(), [2, 3]);
        assert_eq!(batch.len(), 2);

        let one_hot: Vec<f32> = batch.one_hot.into_data().to_vec().unwrap();
        assert_eq!(one_hot, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);

        let targets: Vec<i64> = batch.targets.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(targets, vec![2, 0]);
    }
}
