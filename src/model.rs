use crate::data::class::NUM_CLASSES;
use burn::{
    nn::{
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{MaxPool2d, MaxPool2dConfig},
    },
    prelude::*,
    train::ClassificationOutput,
};

/// Channels after the last convolution.
const CONV_OUT: usize = 64;
/// Spatial size after three 2x2 poolings of a 32x32 input.
const POOLED: usize = 4;

#[derive(Config, Debug)]
pub struct CifarNetConfig {
    #[config(default = "NUM_CLASSES")]
    pub num_classes: usize,
    #[config(default = 500)]
    pub hidden_size: usize,
    #[config(default = 0.5)]
    pub dropout: f64,
}

/// Three 3x3 convolution blocks (conv, relu, 2x2 max-pool) followed by two
/// fully-connected layers.
#[derive(Module, Debug)]
pub struct CifarNet<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
    pub conv3: Conv2d<B>,
    pub pool: MaxPool2d,
    pub fc1: Linear<B>,
    pub dropout: Dropout,
    pub fc2: Linear<B>,
    pub activation: Relu,
}

impl CifarNetConfig {
    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> CifarNet<B> {
        let conv = |channels: [usize; 2]| {
            Conv2dConfig::new(channels, [3, 3])
                .with_stride([1, 1])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device)
        };

        CifarNet {
            conv1: conv([3, 16]),
            conv2: conv([16, 32]),
            conv3: conv([32, CONV_OUT]),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1: LinearConfig::new(POOLED * POOLED * CONV_OUT, self.hidden_size).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc2: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> CifarNet<B> {
    /// # Shapes
    ///   - Input [batch_size, 3, 32, 32]
    ///   - Output [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _channels, _height, _width] = images.dims();

        let x = self.pool.forward(self.activation.forward(self.conv1.forward(images)));
        let x = self.pool.forward(self.activation.forward(self.conv2.forward(x)));
        let x = self.pool.forward(self.activation.forward(self.conv3.forward(x)));
        debug_assert_eq!([batch_size, CONV_OUT, POOLED, POOLED], x.dims());

        let x = x.reshape([batch_size, POOLED * POOLED * CONV_OUT]);
        let x = self.activation.forward(self.fc1.forward(x));
        let x = self.dropout.forward(x);

        self.fc2.forward(x)
    }

    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}
