//! Encoder-decoder network for floor-plan segmentation.
//!
//! ResNet-34 encoder (five stages, each halving resolution) feeding a U-Net
//! style decoder (four 2x stages fused with the matching encoder features),
//! one more 2x upsampling stage and a small refinement head with one logit
//! per class. Variable names follow the PyTorch module tree, so a checkpoint
//! exported to safetensors loads without renaming.

use candle_core::{Module, ModuleT, Result, Tensor};
use candle_nn::{
    batch_norm, conv2d, conv2d_no_bias, conv_transpose2d, BatchNorm, Conv2d, Conv2dConfig,
    ConvTranspose2d, ConvTranspose2dConfig, VarBuilder,
};

const BN_EPS: f64 = 1e-5;

/// (blocks, output channels, stride) for the four residual stages of ResNet-34
const RESNET34_LAYERS: [(usize, usize, usize); 4] = [(3, 64, 1), (4, 128, 2), (6, 256, 2), (3, 512, 2)];

/// (input, skip, output) channels of the decoder stages, deepest first
const DECODER_STAGES: [(usize, usize, usize); 4] = [(512, 256, 256), (256, 128, 128), (128, 64, 64), (64, 64, 64)];

fn conv3x3(in_ch: usize, out_ch: usize, stride: usize, vb: VarBuilder) -> Result<Conv2d> {
    let cfg = Conv2dConfig {
        padding: 1,
        stride,
        ..Default::default()
    };
    conv2d_no_bias(in_ch, out_ch, 3, cfg, vb)
}

fn up2x(in_ch: usize, out_ch: usize, vb: VarBuilder) -> Result<ConvTranspose2d> {
    let cfg = ConvTranspose2dConfig {
        stride: 2,
        ..Default::default()
    };
    conv_transpose2d(in_ch, out_ch, 2, cfg, vb)
}

/// conv3x3-BN-ReLU twice
struct ConvBlock {
    conv1: Conv2d,
    bn1: BatchNorm,
    conv2: Conv2d,
    bn2: BatchNorm,
}

impl ConvBlock {
    fn new(in_ch: usize, out_ch: usize, vb: VarBuilder) -> Result<Self> {
        let vb = vb.pp("conv");
        Ok(Self {
            conv1: conv3x3(in_ch, out_ch, 1, vb.pp(0))?,
            bn1: batch_norm(out_ch, BN_EPS, vb.pp(1))?,
            conv2: conv3x3(out_ch, out_ch, 1, vb.pp(3))?,
            bn2: batch_norm(out_ch, BN_EPS, vb.pp(4))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self.bn1.forward_t(&self.conv1.forward(xs)?, false)?.relu()?;
        self.bn2.forward_t(&self.conv2.forward(&xs)?, false)?.relu()
    }
}

/// ResNet basic residual block
struct BasicBlock {
    conv1: Conv2d,
    bn1: BatchNorm,
    conv2: Conv2d,
    bn2: BatchNorm,
    downsample: Option<(Conv2d, BatchNorm)>,
}

impl BasicBlock {
    fn new(in_ch: usize, out_ch: usize, stride: usize, vb: VarBuilder) -> Result<Self> {
        let downsample = if stride != 1 || in_ch != out_ch {
            let cfg = Conv2dConfig {
                stride,
                ..Default::default()
            };
            let conv = conv2d_no_bias(in_ch, out_ch, 1, cfg, vb.pp("downsample").pp(0))?;
            let bn = batch_norm(out_ch, BN_EPS, vb.pp("downsample").pp(1))?;
            Some((conv, bn))
        } else {
            None
        };

        Ok(Self {
            conv1: conv3x3(in_ch, out_ch, stride, vb.pp("conv1"))?,
            bn1: batch_norm(out_ch, BN_EPS, vb.pp("bn1"))?,
            conv2: conv3x3(out_ch, out_ch, 1, vb.pp("conv2"))?,
            bn2: batch_norm(out_ch, BN_EPS, vb.pp("bn2"))?,
            downsample,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let out = self.bn1.forward_t(&self.conv1.forward(xs)?, false)?.relu()?;
        let out = self.bn2.forward_t(&self.conv2.forward(&out)?, false)?;
        let identity = match &self.downsample {
            Some((conv, bn)) => bn.forward_t(&conv.forward(xs)?, false)?,
            None => xs.clone(),
        };
        (out + identity)?.relu()
    }
}

/// A run of residual blocks forming one encoder stage
struct ResidualStage {
    blocks: Vec<BasicBlock>,
}

impl ResidualStage {
    fn new(in_ch: usize, out_ch: usize, n_blocks: usize, stride: usize, vb: VarBuilder) -> Result<Self> {
        let mut blocks = Vec::with_capacity(n_blocks);
        for i in 0..n_blocks {
            let (block_in, block_stride) = if i == 0 { (in_ch, stride) } else { (out_ch, 1) };
            blocks.push(BasicBlock::new(block_in, out_ch, block_stride, vb.pp(i))?);
        }
        Ok(Self { blocks })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs.clone();
        for block in &self.blocks {
            xs = block.forward(&xs)?;
        }
        Ok(xs)
    }
}

/// Encoder features at 1/2, 1/4, 1/8, 1/16 and 1/32 of the input resolution
struct EncoderFeatures {
    e1: Tensor,
    e2: Tensor,
    e3: Tensor,
    e4: Tensor,
    e5: Tensor,
}

struct Encoder {
    stem_conv: Conv2d,
    stem_bn: BatchNorm,
    stages: Vec<ResidualStage>,
}

impl Encoder {
    fn new(vb: &VarBuilder) -> Result<Self> {
        let stem_cfg = Conv2dConfig {
            padding: 3,
            stride: 2,
            ..Default::default()
        };
        let stem_conv = conv2d_no_bias(3, 64, 7, stem_cfg, vb.pp("enc1").pp(0))?;
        let stem_bn = batch_norm(64, BN_EPS, vb.pp("enc1").pp(1))?;

        // enc2 is Sequential(maxpool, layer1); enc3..enc5 are layer2..layer4
        let prefixes = [vb.pp("enc2").pp(1), vb.pp("enc3"), vb.pp("enc4"), vb.pp("enc5")];
        let mut stages = Vec::with_capacity(RESNET34_LAYERS.len());
        let mut in_ch = 64;
        for ((n_blocks, out_ch, stride), stage_vb) in RESNET34_LAYERS.into_iter().zip(prefixes) {
            stages.push(ResidualStage::new(in_ch, out_ch, n_blocks, stride, stage_vb)?);
            in_ch = out_ch;
        }

        Ok(Self {
            stem_conv,
            stem_bn,
            stages,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<EncoderFeatures> {
        let e1 = self.stem_bn.forward_t(&self.stem_conv.forward(xs)?, false)?.relu()?;
        // 3x3/2 max-pool with padding 1; zero padding is exact after ReLU
        let pooled = e1
            .pad_with_zeros(2, 1, 1)?
            .pad_with_zeros(3, 1, 1)?
            .max_pool2d_with_stride(3, 2)?;
        let e2 = self.stages[0].forward(&pooled)?;
        let e3 = self.stages[1].forward(&e2)?;
        let e4 = self.stages[2].forward(&e3)?;
        let e5 = self.stages[3].forward(&e4)?;
        Ok(EncoderFeatures { e1, e2, e3, e4, e5 })
    }
}

/// 2x transposed conv, concat with the skip features, then a ConvBlock
struct DecoderStage {
    up: ConvTranspose2d,
    conv: ConvBlock,
}

impl DecoderStage {
    fn new(in_ch: usize, skip_ch: usize, out_ch: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            up: up2x(in_ch, out_ch, vb.pp("up"))?,
            conv: ConvBlock::new(out_ch + skip_ch, out_ch, vb.pp("conv"))?,
        })
    }

    fn forward(&self, xs: &Tensor, skip: &Tensor) -> Result<Tensor> {
        let xs = self.up.forward(xs)?;
        let fused = Tensor::cat(&[&xs, skip], 1)?;
        self.conv.forward(&fused)
    }
}

/// Full segmentation network; output is `(batch, num_classes, H, W)` logits
pub struct FloorPlanUNet {
    encoder: Encoder,
    decoder: Vec<DecoderStage>,
    final_up: ConvTranspose2d,
    refine: ConvBlock,
    classifier: Conv2d,
}

impl FloorPlanUNet {
    pub fn new(num_classes: usize, vb: VarBuilder) -> Result<Self> {
        let encoder = Encoder::new(&vb)?;

        let names = ["dec5", "dec4", "dec3", "dec2"];
        let decoder = DECODER_STAGES
            .into_iter()
            .zip(names)
            .map(|((in_ch, skip_ch, out_ch), name)| DecoderStage::new(in_ch, skip_ch, out_ch, vb.pp(name)))
            .collect::<Result<Vec<_>>>()?;

        let final_up = up2x(64, 32, vb.pp("final_up"))?;
        let refine = ConvBlock::new(32, 32, vb.pp("final_conv").pp(0))?;
        let classifier = conv2d(32, num_classes, 1, Conv2dConfig::default(), vb.pp("final_conv").pp(1))?;

        Ok(Self {
            encoder,
            decoder,
            final_up,
            refine,
            classifier,
        })
    }
}

impl Module for FloorPlanUNet {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let f = self.encoder.forward(xs)?;
        let d5 = self.decoder[0].forward(&f.e5, &f.e4)?;
        let d4 = self.decoder[1].forward(&d5, &f.e3)?;
        let d3 = self.decoder[2].forward(&d4, &f.e2)?;
        let d2 = self.decoder[3].forward(&d3, &f.e1)?;
        let up = self.final_up.forward(&d2)?;
        self.classifier.forward(&self.refine.forward(&up)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_output_matches_input_resolution() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let net = FloorPlanUNet::new(11, vb).unwrap();

        let input = Tensor::zeros((1, 3, 64, 64), DType::F32, &device).unwrap();
        let logits = net.forward(&input).unwrap();

        assert_eq!(logits.dims(), &[1, 11, 64, 64]);
    }

    #[test]
    fn test_parameter_names_follow_checkpoint_layout() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let _net = FloorPlanUNet::new(11, vb).unwrap();

        let data = varmap.data().lock().unwrap();
        for name in [
            "enc1.0.weight",
            "enc1.1.running_mean",
            "enc2.1.0.conv1.weight",
            "enc3.0.downsample.0.weight",
            "enc5.2.bn2.bias",
            "dec5.up.weight",
            "dec5.up.bias",
            "dec2.conv.conv.4.running_var",
            "final_up.weight",
            "final_conv.0.conv.0.weight",
            "final_conv.1.bias",
        ] {
            assert!(data.contains_key(name), "missing parameter {name}");
        }
        assert!(!data.contains_key("enc2.1.0.downsample.0.weight"));
    }
}
