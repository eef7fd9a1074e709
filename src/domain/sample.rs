// ============================================================
// Layer 3: SampleArtifact
// ============================================================
// A prefix of a training batch paired with its reconstruction.
// The file name is `EEEEE_SSSSS.png` (1-based epoch, in-epoch
// step), zero-padded so a lexical sort matches creation order.

use crate::domain::image::ImageStack;

/// Width of both numeric fields in a sample file name.
pub const SAMPLE_NAME_DIGITS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct SampleArtifact {
    /// Zero-based epoch index
    pub epoch: usize,

    /// Zero-based step index within the epoch
    pub step: usize,

    pub inputs:  ImageStack,
    pub outputs: ImageStack,
}

impl SampleArtifact {
    pub fn new(epoch: usize, step: usize, inputs: ImageStack, outputs: ImageStack) -> Self {
        Self { epoch, step, inputs, outputs }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{:0width$}_{:0width$}.png",
            self.epoch + 1,
            self.step,
            width = SAMPLE_NAME_DIGITS
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(epoch: usize, step: usize) -> SampleArtifact {
        let stack = ImageStack::new([1, 1, 1, 1], vec![0.0]).unwrap();
        SampleArtifact::new(epoch, step, stack.clone(), stack)
    }

    #[test]
    fn test_file_name_is_zero_padded() {
        assert_eq!(artifact(0, 0).file_name(), "00001_00000.png");
        assert_eq!(artifact(11, 200).file_name(), "00012_00200.png");
    }

    #[test]
    fn test_lexical_order_matches_creation_order() {
        let mut names = vec![
            artifact(1, 0).file_name(),
            artifact(0, 200).file_name(),
            artifact(0, 1000).file_name(),
            artifact(0, 0).file_name(),
        ];
        names.sort();
        assert_eq!(
            names,
            vec!["00001_00000.png", "00001_00200.png", "00001_01000.png", "00002_00000.png"]
        );
    }
}
