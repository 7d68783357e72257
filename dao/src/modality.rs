// Sensor sources of the challenge and their per-channel statistics.

use anyhow::anyhow;
use std::fmt::{self, Display};

pub const S2L1C_MEAN: [f32; 13] = [
    2607.345, 2393.068, 2320.225, 2373.963, 2562.536, 3110.071, 3392.832, 3321.154, 3583.77,
    1838.712, 1021.753, 3205.112, 2545.798,
];
pub const S2L1C_STD: [f32; 13] = [
    786.523, 849.702, 875.318, 1143.578, 1126.248, 1161.98, 1273.505, 1246.79, 1342.755, 576.795,
    45.626, 1340.347, 1145.036,
];

pub const S2L2A_MEAN: [f32; 12] = [
    1793.243, 1924.863, 2184.553, 2340.936, 2671.402, 3240.082, 3468.412, 3563.244, 3627.704,
    3711.071, 3416.714, 2849.625,
];
pub const S2L2A_STD: [f32; 12] = [
    1160.144, 1201.092, 1219.943, 1397.225, 1400.035, 1373.136, 1429.17, 1485.025, 1447.836,
    1652.703, 1471.002, 1365.307,
];

pub const S1GRD_MEAN: [f32; 2] = [-12.577, -20.265];
pub const S1GRD_STD: [f32; 2] = [5.179, 5.872];

pub const S2RGB_MEAN: [f32; 3] = [100.708, 87.489, 61.932];
pub const S2RGB_STD: [f32; 3] = [68.550, 47.647, 40.592];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    /// Sentinel-2 top-of-atmosphere reflectance
    S2L1C,
    /// Sentinel-2 surface reflectance
    S2L2A,
    /// Sentinel-1 ground range detected backscatter (dB)
    S1GRD,
    S2RGB,
}

impl Modality {
    /// Maps a data folder name onto a modality, ignoring case.
    /// The challenge release names the radar folder `s1`, the SSL4EO release `S1GRD`.
    pub fn from_name(name: &str) -> anyhow::Result<Modality> {
        match name.to_ascii_lowercase().as_str() {
            "s2l1c" => Ok(Modality::S2L1C),
            "s2l2a" => Ok(Modality::S2L2A),
            "s1" | "s1grd" => Ok(Modality::S1GRD),
            "s2rgb" => Ok(Modality::S2RGB),
            _ => Err(anyhow!("Unknown modality: {name}")),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Modality::S2L1C => "S2L1C",
            Modality::S2L2A => "S2L2A",
            Modality::S1GRD => "S1GRD",
            Modality::S2RGB => "S2RGB",
        }
    }

    pub fn mean(&self) -> &'static [f32] {
        match self {
            Modality::S2L1C => &S2L1C_MEAN,
            Modality::S2L2A => &S2L2A_MEAN,
            Modality::S1GRD => &S1GRD_MEAN,
            Modality::S2RGB => &S2RGB_MEAN,
        }
    }

    pub fn std(&self) -> &'static [f32] {
        match self {
            Modality::S2L1C => &S2L1C_STD,
            Modality::S2L2A => &S2L2A_STD,
            Modality::S1GRD => &S1GRD_STD,
            Modality::S2RGB => &S2RGB_STD,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.mean().len()
    }
}

impl Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Mean and standard deviation of every channel of the given modalities,
/// concatenated in the order the modalities are listed.
pub fn normalization_stats<S: AsRef<str>>(modalities: &[S]) -> anyhow::Result<(Vec<f32>, Vec<f32>)> {
    let mut mean = vec![];
    let mut std = vec![];
    for name in modalities {
        let modality = Modality::from_name(name.as_ref())?;
        tracing::debug!("Normalising folder {} as {modality}", name.as_ref());
        mean.extend_from_slice(modality.mean());
        std.extend_from_slice(modality.std());
    }
    Ok((mean, std))
}
