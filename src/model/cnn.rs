//! CNN Model Architecture for Crop Disease Classification
//!
//! A small convolutional network trained end-to-end:
//!
//! ```text
//! [conv 3x3 (valid) -> ReLU -> maxpool 2x2] x 3
//! flatten -> dense 512 -> ReLU -> dropout 0.5 -> dense N
//! ```

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{activation::softmax, backend::Backend, Tensor},
};

/// Configuration for the CropClassifier CNN model
///
/// Persisted inside the model artifact as the architecture description.
#[derive(Config, Debug, PartialEq)]
pub struct CropClassifierConfig {
    /// Number of output classes
    pub num_classes: usize,

    /// Input image size (square)
    #[config(default = "224")]
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Filters of the three convolution stages
    #[config(default = "[32, 64, 128]")]
    pub conv_filters: [usize; 3],

    /// Convolution kernel size
    #[config(default = "3")]
    pub kernel_size: usize,

    /// Width of the hidden dense layer
    #[config(default = "512")]
    pub dense_units: usize,

    /// Dropout rate before the output layer
    #[config(default = "0.5")]
    pub dropout: f64,
}

impl CropClassifierConfig {
    /// Spatial size after the convolution stages
    ///
    /// Each stage: valid conv (`s - k + 1`) then 2x2 pool (`floor(s / 2)`).
    /// Returns `None` when the input is too small to survive every stage.
    pub fn feature_map_size(&self) -> Option<usize> {
        let mut size = self.input_size;
        for _ in self.conv_filters {
            size = size.checked_sub(self.kernel_size - 1)? / 2;
            if size == 0 {
                return None;
            }
        }
        Some(size)
    }

    /// Width of the flattened feature vector fed into the dense layer
    pub fn flattened_features(&self) -> Option<usize> {
        let size = self.feature_map_size()?;
        Some(size * size * self.conv_filters[2])
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.num_classes == 0 {
            return Err("num_classes must be greater than 0".to_string());
        }
        if self.in_channels == 0 {
            return Err("in_channels must be greater than 0".to_string());
        }
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return Err("kernel_size must be a positive odd number".to_string());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err("dropout must be in range [0.0, 1.0)".to_string());
        }
        if self.conv_filters.iter().any(|&f| f == 0) || self.dense_units == 0 {
            return Err("layer widths must be greater than 0".to_string());
        }
        if self.feature_map_size().is_none() {
            return Err(format!(
                "input_size {} is too small for three conv/pool stages",
                self.input_size
            ));
        }
        Ok(())
    }

    /// Build the model; panics on an invalid configuration, see `validate`
    pub fn init<B: Backend>(&self, device: &B::Device) -> CropClassifier<B> {
        CropClassifier::new(self, device)
    }
}

/// Convolution stage: valid Conv2d, ReLU, 2x2 MaxPool
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvStage<B> {
    /// Create a new convolution stage
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);

        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self {
            conv,
            relu: Relu::new(),
            pool,
        }
    }

    /// Forward pass through the stage
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Crop disease classifier
#[derive(Module, Debug)]
pub struct CropClassifier<B: Backend> {
    pub stage1: ConvStage<B>,
    pub stage2: ConvStage<B>,
    pub stage3: ConvStage<B>,

    pub fc1: Linear<B>,
    pub dropout: Dropout,
    pub fc2: Linear<B>,
}

impl<B: Backend> CropClassifier<B> {
    /// Create a new classifier from configuration
    pub fn new(config: &CropClassifierConfig, device: &B::Device) -> Self {
        let [f1, f2, f3] = config.conv_filters;
        let k = config.kernel_size;

        let flattened = config
            .flattened_features()
            .unwrap_or_else(|| panic!("invalid classifier config: {:?}", config.validate()));

        Self {
            stage1: ConvStage::new(config.in_channels, f1, k, device),
            stage2: ConvStage::new(f1, f2, k, device),
            stage3: ConvStage::new(f2, f3, k, device),
            fc1: LinearConfig::new(flattened, config.dense_units).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
            fc2: LinearConfig::new(config.dense_units, config.num_classes).init(device),
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, channels, height, width], values in [0, 1]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.stage1.forward(x);
        let x = self.stage2.forward(x);
        let x = self.stage3.forward(x);

        // [B, C, H, W] -> [B, C * H * W]
        let x: Tensor<B, 2> = x.flatten(1, 3);

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Forward pass with softmax; each row sums to 1
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x), 1)
    }

    /// Number of output classes, read from the output layer's weights
    ///
    /// Weights loaded from a record keep their stored shape, so this is the
    /// width the network actually produces rather than the configured one.
    pub fn num_classes(&self) -> usize {
        self.fc2.weight.dims()[1]
    }

    /// Layer table with parameter counts, printed before training
    pub fn summary(&self, config: &CropClassifierConfig) -> String {
        let mut out = String::new();
        let mut size = config.input_size;
        let mut channels = config.in_channels;

        out.push_str(&format!("{:<12} {:<22} {:>12}\n", "Layer", "Output shape", "Params"));
        let stages = [&self.stage1, &self.stage2, &self.stage3];
        for (i, (stage, filters)) in stages.iter().zip(config.conv_filters).enumerate() {
            size = (size - (config.kernel_size - 1)) / 2;
            out.push_str(&format!(
                "{:<12} {:<22} {:>12}\n",
                format!("conv{}", i + 1),
                format!("({}, {}, {})", filters, size, size),
                stage.num_params()
            ));
            channels = filters;
        }
        out.push_str(&format!(
            "{:<12} {:<22} {:>12}\n",
            "flatten",
            format!("({})", channels * size * size),
            0
        ));
        out.push_str(&format!(
            "{:<12} {:<22} {:>12}\n",
            "dense",
            format!("({})", config.dense_units),
            self.fc1.num_params()
        ));
        out.push_str(&format!(
            "{:<12} {:<22} {:>12}\n",
            "dropout",
            format!("({})", config.dense_units),
            0
        ));
        out.push_str(&format!(
            "{:<12} {:<22} {:>12}\n",
            "dense_out",
            format!("({})", self.num_classes()),
            self.fc2.num_params()
        ));
        out.push_str(&format!("Total params: {}\n", self.num_params()));

        out
    }
}
