use burn::{
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
};

/// Learnable codebook of `n_embed` vectors of size `dim`.
#[derive(Module, Debug)]
pub struct Quantizer<B: Backend> {
    pub codebook: Embedding<B>,
    pub dim:      usize,
    pub n_embed:  usize,
}

pub struct Quantized<B: Backend> {
    /// Codebook vectors in the encoder's layout [N, dim, H, W].
    /// Forward value equals the codebook entries, gradient flows to the encoder.
    pub quantized: Tensor<B, 4>,

    /// Codebook term + commitment term, one value per sample [N]
    pub latent_loss: Tensor<B, 1>,
}

impl<B: Backend> Quantizer<B> {
    pub fn new(dim: usize, n_embed: usize, device: &B::Device) -> Self {
        let codebook = EmbeddingConfig::new(n_embed, dim).init(device);
        Self { codebook, dim, n_embed }
    }

    /// z: [N, dim, H, W]
    pub fn forward(&self, z: Tensor<B, 4>) -> Quantized<B> {
        let [n, d, h, w] = z.dims();
        let rows = n * h * w;

        // [N, D, H, W] → [N·H·W, D]
        let flat = z.clone().permute([0, 2, 3, 1]).reshape([rows, d]);
        let embed = self.codebook.weight.val(); // [K, D]

        // ‖x‖² − 2·x·e + ‖e‖², only needed for the argmin
        let x = flat.detach();
        let e = embed.clone().detach();
        let dist = (x.clone() * x.clone()).sum_dim(1)
            - x.matmul(e.clone().transpose()).mul_scalar(2.0)
            + (e.clone() * e).sum_dim(1).reshape([1, self.n_embed]);
        let idx = dist.argmin(1).reshape([rows]); // [N·H·W]

        let q = embed
            .select(0, idx)
            .reshape([n, h, w, d])
            .permute([0, 3, 1, 2]);

        // Codebook term moves the codes, commitment term moves the encoder.
        let codebook_term   = squared(q.clone() - z.clone().detach());
        let commitment_term = squared(q.clone().detach() - z.clone());
        let latent_loss = (codebook_term + commitment_term)
            .reshape([n, d * h * w])
            .mean_dim(1)
            .reshape([n]);

        // Straight-through estimator.
        let quantized = z.clone() + (q - z).detach();

        Quantized { quantized, latent_loss }
    }
}

fn squared<B: Backend>(t: Tensor<B, 4>) -> Tensor<B, 4> {
    t.clone() * t
}
