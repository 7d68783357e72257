use crate::layout::channel_axis;
use crate::modality::normalization_stats;
use crate::Tensor;
use anyhow::ensure;
use ndarray::Array1;

/// A step applied to the concatenated tensor of every sample.
pub trait Transform: Send + Sync {
    fn apply(&self, data: Tensor) -> anyhow::Result<Tensor>;
}

impl<F> Transform for F
where
    F: Fn(Tensor) -> anyhow::Result<Tensor> + Send + Sync,
{
    fn apply(&self, data: Tensor) -> anyhow::Result<Tensor> {
        self(data)
    }
}

/// Per-channel standardisation, `(x - mean[c]) / std[c]` on the channel axis.
#[derive(Debug, Clone)]
pub struct Normalize {
    mean: Array1<f32>,
    std: Array1<f32>,
}

impl Normalize {
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> anyhow::Result<Self> {
        ensure!(
            mean.len() == std.len(),
            "Got {} means but {} standard deviations",
            mean.len(),
            std.len()
        );
        ensure!(std.iter().all(|&s| s != 0.0), "Standard deviations must be non-zero");
        Ok(Self {
            mean: Array1::from_vec(mean),
            std: Array1::from_vec(std),
        })
    }

    /// Statistics of the given modality folders, in that order.
    pub fn for_modalities<S: AsRef<str>>(modalities: &[S]) -> anyhow::Result<Self> {
        let (mean, std) = normalization_stats(modalities)?;
        Self::new(mean, std)
    }

    pub fn num_channels(&self) -> usize {
        self.mean.len()
    }
}

impl Transform for Normalize {
    fn apply(&self, mut data: Tensor) -> anyhow::Result<Tensor> {
        let axis = channel_axis(&data)?;
        ensure!(
            data.len_of(axis) == self.num_channels(),
            "Normalize expects {} channels, tensor of shape {:?} has {}",
            self.num_channels(),
            data.shape(),
            data.len_of(axis)
        );

        for (c, mut channel) in data.axis_iter_mut(axis).enumerate() {
            let (mean, std) = (self.mean[c], self.std[c]);
            channel.mapv_inplace(|x| (x - mean) / std);
        }
        Ok(data)
    }
}

/// Runs transforms one after another.
#[derive(Default)]
pub struct Compose {
    steps: Vec<Box<dyn Transform>>,
}

impl Compose {
    pub fn new(steps: Vec<Box<dyn Transform>>) -> Self {
        Self { steps }
    }

    pub fn then<T: Transform + 'static>(mut self, step: T) -> Self {
        self.steps.push(Box::new(step));
        self
    }
}

impl Transform for Compose {
    fn apply(&self, data: Tensor) -> anyhow::Result<Tensor> {
        self.steps.iter().try_fold(data, |data, step| step.apply(data))
    }
}
