//! SFCN-style convolutional regressors for brain-age estimation.
//!
//! Both models share one shape: five stride-2 3x3 conv blocks with ReLU,
//! global mean pooling over the remaining spatial extent, and a single linear
//! output head. `Sfcn2d` consumes `[n, 1, h, w]` slices, `Sfcn3d` consumes
//! `[n, 1, d, h, w]` volumes; both return `[n, 1]` normalized-age predictions.
//!
//! These are pure Burn Modules; the training crate owns losses, optimizers,
//! and checkpointing.

use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig, Conv3d, Conv3dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d, PaddingConfig3d};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Channel progression of the five conv blocks.
#[derive(Debug, Clone)]
pub struct Sfcn2dConfig {
    pub channels: [usize; 5],
}

impl Default for Sfcn2dConfig {
    fn default() -> Self {
        Self {
            channels: [32, 64, 128, 256, 64],
        }
    }
}

#[derive(Debug, Module)]
pub struct Sfcn2d<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    conv4: Conv2d<B>,
    conv5: Conv2d<B>,
    head: Linear<B>,
    cfg: Ignored<Sfcn2dConfig>,
}

impl<B: Backend> Sfcn2d<B> {
    pub fn new(cfg: Sfcn2dConfig, device: &B::Device) -> Self {
        let c = cfg.channels;
        let block = |inp: usize, out: usize| {
            Conv2dConfig::new([inp, out], [3, 3])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device)
        };
        Self {
            conv1: block(1, c[0]),
            conv2: block(c[0], c[1]),
            conv3: block(c[1], c[2]),
            conv4: block(c[2], c[3]),
            conv5: block(c[3], c[4]),
            head: LinearConfig::new(c[4], 1).init(device),
            cfg: Ignored(cfg),
        }
    }

    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.conv1.forward(images));
        let x = relu(self.conv2.forward(x));
        let x = relu(self.conv3.forward(x));
        let x = relu(self.conv4.forward(x));
        let x = relu(self.conv5.forward(x));
        let [n, ch, _, _] = x.dims();
        let pooled = x.mean_dim(3).mean_dim(2).reshape([n, ch]);
        self.head.forward(pooled)
    }
}

/// Channel progression of the five conv blocks.
#[derive(Debug, Clone)]
pub struct Sfcn3dConfig {
    pub channels: [usize; 5],
}

impl Default for Sfcn3dConfig {
    fn default() -> Self {
        Self {
            channels: [32, 64, 128, 256, 64],
        }
    }
}

#[derive(Debug, Module)]
pub struct Sfcn3d<B: Backend> {
    conv1: Conv3d<B>,
    conv2: Conv3d<B>,
    conv3: Conv3d<B>,
    conv4: Conv3d<B>,
    conv5: Conv3d<B>,
    head: Linear<B>,
    cfg: Ignored<Sfcn3dConfig>,
}

impl<B: Backend> Sfcn3d<B> {
    pub fn new(cfg: Sfcn3dConfig, device: &B::Device) -> Self {
        let c = cfg.channels;
        let block = |inp: usize, out: usize| {
            Conv3dConfig::new([inp, out], [3, 3, 3])
                .with_stride([2, 2, 2])
                .with_padding(PaddingConfig3d::Explicit(1, 1, 1))
                .init(device)
        };
        Self {
            conv1: block(1, c[0]),
            conv2: block(c[0], c[1]),
            conv3: block(c[1], c[2]),
            conv4: block(c[2], c[3]),
            conv5: block(c[3], c[4]),
            head: LinearConfig::new(c[4], 1).init(device),
            cfg: Ignored(cfg),
        }
    }

    pub fn forward(&self, volumes: Tensor<B, 5>) -> Tensor<B, 2> {
        let x = relu(self.conv1.forward(volumes));
        let x = relu(self.conv2.forward(x));
        let x = relu(self.conv3.forward(x));
        let x = relu(self.conv4.forward(x));
        let x = relu(self.conv5.forward(x));
        let [n, ch, _, _, _] = x.dims();
        let pooled = x.mean_dim(4).mean_dim(3).mean_dim(2).reshape([n, ch]);
        self.head.forward(pooled)
    }
}

pub mod prelude {
    pub use super::{Sfcn2d, Sfcn2dConfig, Sfcn3d, Sfcn3dConfig};
}
