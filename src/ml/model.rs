use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::quantize::Quantizer;

// #[derive(Config)] brings Clone and serde; deriving them again conflicts.
#[derive(Config, Debug)]
pub struct VqVaeConfig {
    #[config(default = 3)]
    pub in_channels:   usize,
    #[config(default = 128)]
    pub channel:       usize,
    #[config(default = 2)]
    pub n_res_block:   usize,
    #[config(default = 32)]
    pub n_res_channel: usize,
    #[config(default = 64)]
    pub embed_dim:     usize,
    #[config(default = 512)]
    pub n_embed:       usize,
}

impl VqVaeConfig {
    /// Spatial downsampling factor between image and latent grid.
    pub const DOWNSAMPLE: usize = 4;

    pub fn init<B: Backend>(&self, device: &B::Device) -> VqVae<B> {
        let half = self.channel / 2;

        let enc_conv1 = conv(self.in_channels, half, 4, 2, 1, device);
        let enc_conv2 = conv(half, self.channel, 4, 2, 1, device);
        let enc_conv3 = conv(self.channel, self.channel, 3, 1, 1, device);
        let enc_res   = self.res_blocks(device);

        let quantize_conv = conv(self.channel, self.embed_dim, 1, 1, 0, device);
        let quantizer     = Quantizer::new(self.embed_dim, self.n_embed, device);

        let dec_conv  = conv(self.embed_dim, self.channel, 3, 1, 1, device);
        let dec_res   = self.res_blocks(device);
        let dec_up1   = conv_t(self.channel, half, device);
        let dec_up2   = conv_t(half, self.in_channels, device);

        VqVae {
            enc_conv1, enc_conv2, enc_conv3, enc_res,
            quantize_conv, quantizer,
            dec_conv, dec_res, dec_up1, dec_up2,
        }
    }

    fn res_blocks<B: Backend>(&self, device: &B::Device) -> Vec<ResBlock<B>> {
        (0..self.n_res_block)
            .map(|_| ResBlock {
                conv1: conv(self.channel, self.n_res_channel, 3, 1, 1, device),
                conv2: conv(self.n_res_channel, self.channel, 1, 1, 0, device),
            })
            .collect()
    }
}

fn conv<B: Backend>(
    input:   usize,
    output:  usize,
    kernel:  usize,
    stride:  usize,
    padding: usize,
    device:  &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([input, output], [kernel, kernel])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .init(device)
}

/// 4×4 transposed conv, stride 2, padding 1: doubles H and W.
fn conv_t<B: Backend>(input: usize, output: usize, device: &B::Device) -> ConvTranspose2d<B> {
    ConvTranspose2dConfig::new([input, output], [4, 4])
        .with_stride([2, 2])
        .with_padding([1, 1])
        .init(device)
}

/// relu → 3×3 conv → relu → 1×1 conv, added back onto the input.
#[derive(Module, Debug)]
pub struct ResBlock<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
}

impl<B: Backend> ResBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv1.forward(relu(x.clone()));
        let out = self.conv2.forward(relu(out));
        x + out
    }
}

#[derive(Module, Debug)]
pub struct VqVae<B: Backend> {
    pub enc_conv1:     Conv2d<B>,
    pub enc_conv2:     Conv2d<B>,
    pub enc_conv3:     Conv2d<B>,
    pub enc_res:       Vec<ResBlock<B>>,
    pub quantize_conv: Conv2d<B>,
    pub quantizer:     Quantizer<B>,
    pub dec_conv:      Conv2d<B>,
    pub dec_res:       Vec<ResBlock<B>>,
    pub dec_up1:       ConvTranspose2d<B>,
    pub dec_up2:       ConvTranspose2d<B>,
}

impl<B: Backend> VqVae<B> {
    /// images: [N, C, H, W] → [N, channel, H/4, W/4]
    pub fn encode(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.enc_conv1.forward(images));
        let x = relu(self.enc_conv2.forward(x));
        let mut x = self.enc_conv3.forward(x);
        for block in &self.enc_res {
            x = block.forward(x);
        }
        relu(x)
    }

    /// quantized: [N, embed_dim, H/4, W/4] → [N, C, H, W]
    pub fn decode(&self, quantized: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.dec_conv.forward(quantized);
        for block in &self.dec_res {
            x = block.forward(x);
        }
        let x = relu(x);
        let x = relu(self.dec_up1.forward(x));
        self.dec_up2.forward(x)
    }

    /// images: [N, C, H, W] → (reconstruction [N, C, H, W], latent_loss [N])
    pub fn forward(&self, images: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 1>) {
        let z = self.quantize_conv.forward(self.encode(images));
        let q = self.quantizer.forward(z);
        (self.decode(q.quantized), q.latent_loss)
    }
}
