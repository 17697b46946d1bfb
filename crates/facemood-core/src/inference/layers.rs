//! Building blocks shared by the detector and mesh networks.

use candle_core::{Module, Tensor};
use candle_nn::{conv2d, prelu, Conv2d, Conv2dConfig, PReLU, VarBuilder};

/// Logit clamp applied before the sigmoid, matching the reference decoders.
const LOGIT_CLIP: f32 = 100.0;

/// Sigmoid activation with clipped input.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x.clamp(-LOGIT_CLIP, LOGIT_CLIP)).exp())
}

/// Pads one row on top and one column on the left by reflection.
///
/// Equivalent to `ReflectionPad2d((1, 0, 1, 0))` on an NCHW tensor.
pub fn reflect_pad_top_left(x: &Tensor) -> candle_core::Result<Tensor> {
    let x = Tensor::cat(&[&x.narrow(3, 1, 1)?, x], 3)?;
    Tensor::cat(&[&x.narrow(2, 1, 1)?, &x], 2)
}

/// Activation applied after the residual sum.
enum Activation {
    Relu,
    Prelu(PReLU),
}

impl Module for Activation {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Self::Relu => x.relu(),
            Self::Prelu(p) => p.forward(x),
        }
    }
}

/// Depthwise-separable residual block.
///
/// `convs.0` is the depthwise convolution, `convs.1` the pointwise one. With
/// stride 2 the input is padded bottom/right before the depthwise conv and the
/// skip path is max-pooled. Missing output channels on the skip path are
/// zero-filled.
pub struct ResidualBlock {
    depthwise: Conv2d,
    pointwise: Conv2d,
    activation: Activation,
    channel_pad: usize,
    stride: usize,
}

impl ResidualBlock {
    /// Block followed by ReLU (detector).
    ///
    /// # Errors
    ///
    /// Returns an error if weights are missing or mis-shaped.
    pub fn relu(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        vb: &VarBuilder,
    ) -> candle_core::Result<Self> {
        Self::build(in_channels, out_channels, stride, Activation::Relu, vb)
    }

    /// Block followed by a per-channel PReLU stored under `act` (mesh).
    ///
    /// # Errors
    ///
    /// Returns an error if weights are missing or mis-shaped.
    pub fn prelu(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        vb: &VarBuilder,
    ) -> candle_core::Result<Self> {
        let act = prelu(Some(out_channels), vb.pp("act"))?;
        Self::build(in_channels, out_channels, stride, Activation::Prelu(act), vb)
    }

    fn build(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        activation: Activation,
        vb: &VarBuilder,
    ) -> candle_core::Result<Self> {
        let depthwise = conv2d(
            in_channels,
            in_channels,
            3,
            Conv2dConfig {
                stride,
                padding: usize::from(stride == 1),
                groups: in_channels,
                ..Conv2dConfig::default()
            },
            vb.pp("convs.0"),
        )?;
        let pointwise = conv2d(
            in_channels,
            out_channels,
            1,
            Conv2dConfig::default(),
            vb.pp("convs.1"),
        )?;

        Ok(Self {
            depthwise,
            pointwise,
            activation,
            channel_pad: out_channels.saturating_sub(in_channels),
            stride,
        })
    }
}

impl Module for ResidualBlock {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let (h, skip) = if self.stride == 2 {
            let h = x.pad_with_zeros(2, 0, 2)?.pad_with_zeros(3, 0, 2)?;
            (h, x.max_pool2d(2)?)
        } else {
            (x.clone(), x.clone())
        };

        let h = self.pointwise.forward(&self.depthwise.forward(&h)?)?;
        let skip = if self.channel_pad > 0 {
            skip.pad_with_zeros(1, 0, self.channel_pad)?
        } else {
            skip
        };

        self.activation.forward(&(h + skip)?)
    }
}
