// Small zarr stores zipped the way xarray's to_zarr + zip produces them.

use crate::Tensor;
use ndarray::ArrayD;
use serde_json::json;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use zarrs::array::codec::GzipCodec;
use zarrs::array::{ArrayBuilder, DataType, Element, FillValue};
use zarrs::filesystem::FilesystemStore;
use zarrs::group::GroupBuilder;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Clone, Copy)]
pub(crate) enum FixtureDtype {
    U16,
    F32,
}

/// Distinct value per sample, modality, time, channel and pixel (fits in u16).
pub(crate) fn pattern_value(sample: usize, modality: usize, time: usize, channel: usize, pixel: usize) -> f32 {
    (sample * 10_000 + modality * 1_000 + time * 100 + channel * 10 + pixel) as f32
}

pub(crate) fn write_zarr_zip(
    path: &Path,
    dataset_name: &str,
    data: &Tensor,
    dtype: FixtureDtype,
    with_sample_dim: bool,
) -> anyhow::Result<()> {
    let shape = data.shape().to_vec();
    let dims = if with_sample_dim {
        vec!["sample", "time", "band", "y", "x"]
    } else {
        vec!["time", "band", "y", "x"]
    };

    let (dtype_str, bytes): (&str, Vec<u8>) = match dtype {
        FixtureDtype::U16 => ("<u2", data.iter().flat_map(|&v| (v as u16).to_le_bytes()).collect()),
        FixtureDtype::F32 => ("<f4", data.iter().flat_map(|&v| v.to_le_bytes()).collect()),
    };

    let zarray = json!({
        "zarr_format": 2,
        "shape": shape,
        "chunks": shape,
        "dtype": dtype_str,
        "compressor": null,
        "fill_value": 0,
        "filters": null,
        "order": "C",
    });
    let chunk_key = vec!["0"; shape.len()].join(".");

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut zip = ZipWriter::new(File::create(path)?);

    zip.start_file(".zgroup", options)?;
    zip.write_all(json!({ "zarr_format": 2 }).to_string().as_bytes())?;
    zip.start_file(".zattrs", options)?;
    zip.write_all(b"{}")?;
    zip.start_file(format!("{dataset_name}/.zarray"), options)?;
    zip.write_all(zarray.to_string().as_bytes())?;
    zip.start_file(format!("{dataset_name}/.zattrs"), options)?;
    zip.write_all(json!({ "_ARRAY_DIMENSIONS": dims }).to_string().as_bytes())?;
    zip.start_file(format!("{dataset_name}/{chunk_key}"), options)?;
    zip.write_all(&bytes)?;
    zip.finish()?;

    Ok(())
}

/// Writes `data` through zarrs as a gzip-compressed zarr v3 array, then zips the store.
/// `dims` goes into the `_ARRAY_DIMENSIONS` attribute.
pub(crate) fn write_zarr_v3_zip<T>(
    path: &Path,
    dataset_name: &str,
    data: &ArrayD<T>,
    data_type: DataType,
    dims: &[&str],
) -> anyhow::Result<()>
where
    T: Element + Copy + Default,
    FillValue: From<T>,
{
    let staging = tempfile::tempdir()?;
    let store = Arc::new(FilesystemStore::new(staging.path())?);
    GroupBuilder::new().build(Arc::clone(&store), "/")?.store_metadata()?;

    let shape = data.shape().iter().map(|&len| len as u64).collect::<Vec<_>>();
    let mut attributes = serde_json::Map::new();
    attributes.insert("_ARRAY_DIMENSIONS".to_string(), json!(dims));

    let array = ArrayBuilder::new(
        shape.clone(),
        data_type,
        shape.clone().try_into()?,
        FillValue::from(T::default()),
    )
    .bytes_to_bytes_codecs(vec![Arc::new(GzipCodec::new(5)?)])
    .attributes(attributes)
    .build(Arc::clone(&store), &format!("/{dataset_name}"))?;
    array.store_metadata()?;

    let elements = data.as_standard_layout().iter().copied().collect::<Vec<_>>();
    array.store_chunk_elements(&vec![0u64; shape.len()], &elements)?;

    zip_dir(staging.path(), path)
}

// Stores every file under `dir` in a zip, keyed by its '/'-separated relative path
fn zip_dir(dir: &Path, path: &Path) -> anyhow::Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut zip = ZipWriter::new(File::create(path)?);

    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let entry_path = entry?.path();
            if entry_path.is_dir() {
                pending.push(entry_path);
                continue;
            }
            let key = entry_path
                .strip_prefix(dir)?
                .components()
                .map(|part| part.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            zip.start_file(key, options)?;
            zip.write_all(&fs::read(&entry_path)?)?;
        }
    }
    zip.finish()?;

    Ok(())
}

pub(crate) struct FixtureModality<'a> {
    pub name: &'a str,
    pub channels: usize,
}

/// Lays out `root/<modality>/<id>.zarr.zip`, each archive `[1, times, channels, 2, 2]`
/// filled with [`pattern_value`].
pub(crate) fn write_challenge_tree(
    root: &Path,
    modalities: &[FixtureModality],
    ids: &[&str],
    times: usize,
) -> anyhow::Result<()> {
    for (m, modality) in modalities.iter().enumerate() {
        let dir = root.join(modality.name);
        fs::create_dir_all(&dir)?;
        for (s, id) in ids.iter().enumerate() {
            let data = Tensor::from_shape_fn(ndarray::IxDyn(&[1, times, modality.channels, 2, 2]), |ix| {
                pattern_value(s, m, ix[1], ix[2], ix[3] * 2 + ix[4])
            });
            write_zarr_zip(&dir.join(format!("{id}.zarr.zip")), "bands", &data, FixtureDtype::U16, true)?;
        }
    }
    Ok(())
}

/// Lays out bundled archives `[bundle, times, channels, 2, 2]`; sample `b` of file `f`
/// carries `pattern_value(f * bundle + b, ..)`.
pub(crate) fn write_bundled_tree(
    root: &Path,
    modalities: &[FixtureModality],
    file_names: &[&str],
    bundle: usize,
    times: usize,
) -> anyhow::Result<()> {
    for (m, modality) in modalities.iter().enumerate() {
        let dir = root.join(modality.name);
        fs::create_dir_all(&dir)?;
        for (f, name) in file_names.iter().enumerate() {
            let data = Tensor::from_shape_fn(ndarray::IxDyn(&[bundle, times, modality.channels, 2, 2]), |ix| {
                pattern_value(f * bundle + ix[0], m, ix[1], ix[2], ix[3] * 2 + ix[4])
            });
            write_zarr_zip(&dir.join(name), "bands", &data, FixtureDtype::U16, true)?;
        }
    }
    Ok(())
}
