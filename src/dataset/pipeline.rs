//! Lazy batch pipeline over an image folder
//!
//! An [`ImagePipeline`] is immutable once built. Each call to
//! [`ImagePipeline::epoch`] starts an independent pass, so iterating again
//! (or restarting a [`BatchStream`]) never depends on earlier passes and
//! never touches the files beyond reading them.

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::Backend;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::dataset::augmentation::{AugmentationConfig, Augmenter};
use crate::dataset::burn_dataset::{CropBatch, CropBatcher, ImageFolderDataset};
use crate::dataset::loader::ImageFolder;
use crate::model::labels::LabelRegistry;
use crate::utils::error::Result;

/// Batching, shuffling and augmentation settings over one split
#[derive(Debug, Clone)]
pub struct ImagePipeline {
    dataset: ImageFolderDataset,
    registry: LabelRegistry,
    batch_size: usize,
    augmenter: Option<Augmenter>,
    shuffle: bool,
    seed: u64,
}

impl ImagePipeline {
    /// Deterministic, non-augmenting pipeline (validation / test)
    pub fn new(folder: &ImageFolder, image_size: usize, batch_size: usize) -> Self {
        Self {
            dataset: ImageFolderDataset::from_folder(folder, image_size),
            registry: folder.registry().clone(),
            batch_size: batch_size.max(1),
            augmenter: None,
            shuffle: false,
            seed: 0,
        }
    }

    /// Augment every image with `config`; an identity config disables it
    pub fn with_augmentation(mut self, config: AugmentationConfig) -> Self {
        self.augmenter = (!config.is_identity()).then(|| Augmenter::new(config));
        self
    }

    /// Shuffle every epoch; epoch `n` uses `seed + n`
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.seed = seed;
        self
    }

    /// Number of images
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Batches per epoch, the last one possibly short
    pub fn batches_per_epoch(&self) -> usize {
        self.len().div_ceil(self.batch_size)
    }

    pub fn num_classes(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &LabelRegistry {
        &self.registry
    }

    pub fn is_augmenting(&self) -> bool {
        self.augmenter.is_some()
    }

    /// One lazy pass over the split
    pub fn epoch<B: Backend>(&self, epoch: usize, device: &B::Device) -> EpochBatches<'_, B> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(epoch as u64));
        let mut order: Vec<usize> = (0..self.len()).collect();
        if self.shuffle {
            order.shuffle(&mut rng);
        }

        EpochBatches {
            pipeline: self,
            order,
            cursor: 0,
            rng,
            batcher: CropBatcher::new(self.dataset.image_size(), self.num_classes()),
            device: device.clone(),
        }
    }

    /// Endless sequence of batches, starting again at epoch 0 on every call
    pub fn stream<B: Backend>(&self, device: &B::Device) -> BatchStream<'_, B> {
        BatchStream {
            pipeline: self,
            epoch: 0,
            current: self.epoch(0, device),
            device: device.clone(),
        }
    }
}

/// Batches of a single epoch, decoded on demand
pub struct EpochBatches<'a, B: Backend> {
    pipeline: &'a ImagePipeline,
    order: Vec<usize>,
    cursor: usize,
    rng: ChaCha8Rng,
    batcher: CropBatcher<B>,
    device: B::Device,
}

impl<B: Backend> EpochBatches<'_, B> {
    /// Batches left in this epoch
    pub fn remaining(&self) -> usize {
        (self.order.len() - self.cursor).div_ceil(self.pipeline.batch_size)
    }
}

impl<B: Backend> Iterator for EpochBatches<'_, B> {
    type Item = Result<CropBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }

        let end = (self.cursor + self.pipeline.batch_size).min(self.order.len());
        let indices = &self.order[self.cursor..end];
        self.cursor = end;

        let mut items = Vec::with_capacity(indices.len());
        for &index in indices {
            let augment = match &self.pipeline.augmenter {
                Some(augmenter) => Some((augmenter, &mut self.rng)),
                None => None,
            };
            match self.pipeline.dataset.try_get(index, augment)? {
                Ok(item) => items.push(item),
                Err(e) => return Some(Err(e)),
            }
        }

        Some(Ok(self.batcher.batch(items, &self.device)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

/// Infinite batch sequence cycling through epochs
pub struct BatchStream<'a, B: Backend> {
    pipeline: &'a ImagePipeline,
    epoch: usize,
    current: EpochBatches<'a, B>,
    device: B::Device,
}

impl<B: Backend> BatchStream<'_, B> {
    /// Epoch the next batch belongs to
    pub fn epoch(&self) -> usize {
        self.epoch
    }
}

impl<B: Backend> Iterator for BatchStream<'_, B> {
    type Item = Result<CropBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pipeline.is_empty() {
            return None;
        }
        if let Some(batch) = self.current.next() {
            return Some(batch);
        }
        self.epoch += 1;
        self.current = self.pipeline.epoch(self.epoch, &self.device);
        self.current.next()
    }
}
