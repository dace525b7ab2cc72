use anyhow::Result;
use burn::{
    nn::{
        conv::{Conv1d, Conv1dConfig},
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        PaddingConfig1d,
    },
    prelude::*,
    tensor::{activation, Distribution},
};

use crate::ml::state_dict::{export_param, import_param, StateDict};

/// (kernel_size, dilation) of each TDNN layer
const TDNN_LAYERS: [(usize, usize); 3] = [(5, 1), (3, 2), (3, 3)];

const POOL_EPS: f64 = 1e-5;

#[derive(Config, Debug)]
pub struct SpeakerNetConfig {
    /// Channel width of the TDNN stack
    pub channels: usize,
    /// Samples per input frame; 160 = 10 ms at 16 kHz
    #[config(default = 160)]
    pub frame_len: usize,
    #[config(default = 128)]
    pub hidden: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    /// Std-dev of the Gaussian noise added when augmentation is on
    #[config(default = 0.005)]
    pub aug_noise_std: f64,
}

impl SpeakerNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SpeakerNet<B> {
        let mut in_channels = self.frame_len;
        let blocks = TDNN_LAYERS
            .iter()
            .map(|&(kernel, dilation)| {
                let conv = Conv1dConfig::new(in_channels, self.channels, kernel)
                    .with_dilation(dilation)
                    .with_padding(PaddingConfig1d::Explicit(dilation * (kernel - 1) / 2))
                    .init(device);
                in_channels = self.channels;
                TdnnBlock { conv }
            })
            .collect();

        SpeakerNet {
            blocks,
            fc:            LinearConfig::new(2 * self.channels, self.hidden).init(device),
            head:          LinearConfig::new(self.hidden, 1).init(device),
            dropout:       DropoutConfig::new(self.dropout).init(),
            frame_len:     self.frame_len,
            aug_noise_std: self.aug_noise_std,
        }
    }
}

#[derive(Module, Debug)]
pub struct TdnnBlock<B: Backend> {
    pub conv: Conv1d<B>,
}

impl<B: Backend> TdnnBlock<B> {
    /// [batch, c_in, frames] → [batch, c_out, frames]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        activation::relu(self.conv.forward(x))
    }
}

/// Dilated TDNN stack + statistics pooling + sigmoid head.
#[derive(Module, Debug)]
pub struct SpeakerNet<B: Backend> {
    pub blocks:        Vec<TdnnBlock<B>>,
    pub fc:            Linear<B>,
    pub head:          Linear<B>,
    pub dropout:       Dropout,
    pub frame_len:     usize,
    pub aug_noise_std: f64,
}

impl<B: Backend> SpeakerNet<B> {
    /// waveforms: [batch, samples] → probability of label 1: [batch]
    ///
    /// `samples` must be at least `frame_len`; a trailing partial frame
    /// is dropped.
    pub fn forward(&self, waveforms: Tensor<B, 2>, augment: bool) -> Tensor<B, 1> {
        let [batch, samples] = waveforms.dims();

        let x = if augment && self.aug_noise_std > 0.0 {
            let noise = Tensor::random(
                [batch, samples],
                Distribution::Normal(0.0, self.aug_noise_std),
                &waveforms.device(),
            );
            waveforms + noise
        } else {
            waveforms
        };

        // Each frame's samples become the input channels of one time step.
        let frames = samples / self.frame_len;
        let mut x = x
            .slice([0..batch, 0..frames * self.frame_len])
            .reshape([batch, frames, self.frame_len])
            .swap_dims(1, 2); // [batch, frame_len, frames]

        for block in &self.blocks {
            x = block.forward(x);
        }
        let [_, channels, _] = x.dims();

        // Statistics pooling over time: mean ‖ std
        let mean     = x.clone().mean_dim(2); // [batch, C, 1]
        let centered = x - mean.clone();
        let var      = (centered.clone() * centered).mean_dim(2);
        let std      = (var + POOL_EPS).sqrt();
        let pooled   = Tensor::cat(vec![mean, std], 1).reshape([batch, 2 * channels]);

        let h      = activation::relu(self.fc.forward(self.dropout.forward(pooled)));
        let logits = self.head.forward(h).reshape([batch]);
        activation::sigmoid(logits)
    }

    /// Named copy of every learnable parameter.
    pub fn state_dict(&self) -> Result<StateDict> {
        let mut dict = StateDict::new();
        for (i, block) in self.blocks.iter().enumerate() {
            export_conv(&mut dict, &format!("blocks.{i}.conv"), &block.conv)?;
        }
        export_linear(&mut dict, "fc", &self.fc)?;
        export_linear(&mut dict, "head", &self.head)?;
        Ok(dict)
    }

    /// Overwrite the parameters named in `dict`; everything else is kept.
    /// Shapes must already have been checked against `state_dict()`.
    pub fn load_state(mut self, dict: &StateDict, device: &B::Device) -> Self {
        self.blocks = self
            .blocks
            .into_iter()
            .enumerate()
            .map(|(i, mut block)| {
                block.conv = load_conv(block.conv, &format!("blocks.{i}.conv"), dict, device);
                block
            })
            .collect();
        self.fc   = load_linear(self.fc, "fc", dict, device);
        self.head = load_linear(self.head, "head", dict, device);
        self
    }
}

fn export_conv<B: Backend>(dict: &mut StateDict, prefix: &str, conv: &Conv1d<B>) -> Result<()> {
    export_param(dict, format!("{prefix}.weight"), &conv.weight)?;
    if let Some(bias) = &conv.bias {
        export_param(dict, format!("{prefix}.bias"), bias)?;
    }
    Ok(())
}

fn export_linear<B: Backend>(dict: &mut StateDict, prefix: &str, linear: &Linear<B>) -> Result<()> {
    export_param(dict, format!("{prefix}.weight"), &linear.weight)?;
    if let Some(bias) = &linear.bias {
        export_param(dict, format!("{prefix}.bias"), bias)?;
    }
    Ok(())
}

fn load_conv<B: Backend>(
    mut conv: Conv1d<B>,
    prefix:   &str,
    dict:     &StateDict,
    device:   &B::Device,
) -> Conv1d<B> {
    conv.weight = import_param(conv.weight, dict.get(&format!("{prefix}.weight")), device);
    conv.bias   = conv
        .bias
        .map(|b| import_param(b, dict.get(&format!("{prefix}.bias")), device));
    conv
}

fn load_linear<B: Backend>(
    mut linear: Linear<B>,
    prefix:     &str,
    dict:       &StateDict,
    device:     &B::Device,
) -> Linear<B> {
    linear.weight = import_param(linear.weight, dict.get(&format!("{prefix}.weight")), device);
    linear.bias   = linear
        .bias
        .map(|b| import_param(b, dict.get(&format!("{prefix}.bias")), device));
    linear
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn tiny() -> SpeakerNetConfig {
        SpeakerNetConfig::new(4).with_frame_len(8).with_hidden(6)
    }

    #[test]
    fn test_forward_outputs_probabilities() {
        let device = Default::default();
        let model  = tiny().init::<TestBackend>(&device);
        let input  = Tensor::<TestBackend, 2>::random([3, 50], Distribution::Default, &device);

        for augment in [false, true] {
            let probs = model.forward(input.clone(), augment);
            assert_eq!(probs.dims(), [3]);
            let values: Vec<f32> = probs.into_data().to_vec().unwrap();
            assert!(values.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn test_single_frame_input() {
        let device = Default::default();
        let model  = tiny().init::<TestBackend>(&device);
        let input  = Tensor::<TestBackend, 2>::ones([1, 8], &device);
        let probs: Vec<f32> = model.forward(input, false).into_data().to_vec().unwrap();
        assert!(probs[0].is_finite());
    }

    #[test]
    fn test_state_dict_names_and_shapes() {
        let device = Default::default();
        let dict   = tiny().init::<TestBackend>(&device).state_dict().unwrap();

        assert_eq!(dict.len(), 10);
        assert_eq!(dict.get("blocks.0.conv.weight").unwrap().shape, vec![4, 8, 5]);
        assert_eq!(dict.get("blocks.2.conv.bias").unwrap().shape, vec![4]);
        assert_eq!(dict.get("fc.weight").unwrap().shape, vec![8, 6]);
        assert_eq!(dict.get("head.bias").unwrap().shape, vec![1]);
    }

    #[test]
    fn test_load_state_overwrites_only_named_params() {
        let device = Default::default();
        let source = tiny().init::<TestBackend>(&device);
        let target = tiny().init::<TestBackend>(&device);

        let src  = source.state_dict().unwrap();
        let before = target.state_dict().unwrap();

        let mut partial = StateDict::new();
        partial.insert("head.weight", src.get("head.weight").unwrap().clone());

        let after = target.load_state(&partial, &device).state_dict().unwrap();
        assert_eq!(after.get("head.weight"), src.get("head.weight"));
        assert_eq!(after.get("fc.weight"), before.get("fc.weight"));
        assert_eq!(after.get("blocks.1.conv.weight"), before.get("blocks.1.conv.weight"));
    }
}
