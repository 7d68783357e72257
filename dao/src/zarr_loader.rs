use crate::Tensor;
use anyhow::{anyhow, bail, ensure, Context};
use ndarray::{ArrayD, Axis};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use zarrs::array::{Array, DataType, ElementOwned};
use zarrs::filesystem::FilesystemStore;
use zarrs::storage::{ReadableStorageTraits, StoreKey};
use zarrs_zip::ZipStorageAdapter;

pub const ARCHIVE_SUFFIX: &str = ".zarr.zip";
pub const DEFAULT_DATASET_NAME: &str = "bands";

const DIMENSIONS_ATTR: &str = "_ARRAY_DIMENSIONS";
const TIME_DIM: &str = "time";

/// Reads the named variable of a zipped zarr store into an `f32` tensor.
///
/// The result always has a leading sample axis: archives holding a single
/// `[T, C, H, W]` sample come back as `[1, T, C, H, W]`.
pub fn read_bands(archive_path: &Path, dataset_name: &str) -> anyhow::Result<Tensor> {
    let dir = match archive_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let file_name = archive_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("Invalid archive path {}", archive_path.display()))?;

    let store = Arc::new(FilesystemStore::new(dir)?);
    let zip_store = Arc::new(ZipStorageAdapter::new(store, StoreKey::new(file_name)?)?);
    let array = Array::open(zip_store, &format!("/{dataset_name}"))
        .with_context(|| format!("Opening '{dataset_name}' in {}", archive_path.display()))?;

    let ndim = array.shape().len();
    ensure!(
        ndim >= 4,
        "Expected at least [time, channel, height, width] in {}, found {ndim} dimensions",
        archive_path.display()
    );
    let time_axis = time_axis(&array, ndim);
    ensure!(
        time_axis == ndim - 4,
        "Expected time as the fourth-last dimension in {}, found it at {time_axis}",
        archive_path.display()
    );

    let data = retrieve_f32(&array)
        .with_context(|| format!("Reading '{dataset_name}' from {}", archive_path.display()))?;

    tracing::debug!("Read {} with shape {:?}", archive_path.display(), data.shape());

    if ndim == 4 {
        Ok(data.insert_axis(Axis(0)))
    } else {
        Ok(data)
    }
}

// xarray records dimension names in an attribute; fall back to the [.., T, C, H, W] convention
fn time_axis<S: ?Sized>(array: &Array<S>, ndim: usize) -> usize {
    array
        .attributes()
        .get(DIMENSIONS_ATTR)
        .and_then(|dims| dims.as_array())
        .and_then(|dims| dims.iter().position(|dim| dim.as_str() == Some(TIME_DIM)))
        .unwrap_or(ndim - 4)
}

fn retrieve<T, S>(array: &Array<S>) -> anyhow::Result<ArrayD<T>>
where
    T: ElementOwned,
    S: ?Sized + ReadableStorageTraits + 'static,
{
    Ok(array.retrieve_array_subset_ndarray::<T>(&array.subset_all())?)
}

fn retrieve_f32<S>(array: &Array<S>) -> anyhow::Result<Tensor>
where
    S: ?Sized + ReadableStorageTraits + 'static,
{
    let data = match array.data_type() {
        DataType::UInt8 => retrieve::<u8, _>(array)?.mapv(f32::from),
        DataType::UInt16 => retrieve::<u16, _>(array)?.mapv(f32::from),
        DataType::UInt32 => retrieve::<u32, _>(array)?.mapv(|v| v as f32),
        DataType::Int8 => retrieve::<i8, _>(array)?.mapv(f32::from),
        DataType::Int16 => retrieve::<i16, _>(array)?.mapv(f32::from),
        DataType::Int32 => retrieve::<i32, _>(array)?.mapv(|v| v as f32),
        DataType::Float32 => retrieve::<f32, _>(array)?,
        DataType::Float64 => retrieve::<f64, _>(array)?.mapv(|v| v as f32),
        other => bail!("Unsupported band data type {other:?}"),
    };
    Ok(data)
}

/// Gathers the given timestamps, in the given order, from a `[.., T, C, H, W]` tensor.
pub fn select_times(data: &Tensor, times: &[usize]) -> anyhow::Result<Tensor> {
    let axis = time_axis_of(data)?;
    let available = data.shape()[axis];
    if let Some(bad) = times.iter().find(|&&t| t >= available) {
        bail!("Timestamp {bad} requested but only {available} available");
    }
    Ok(data.select(Axis(axis), times))
}

/// Picks one timestamp and drops the time axis: `[B, T, C, H, W]` becomes `[B, C, H, W]`.
pub fn select_time(data: &Tensor, time: usize) -> anyhow::Result<Tensor> {
    let axis = time_axis_of(data)?;
    let available = data.shape()[axis];
    ensure!(time < available, "Timestamp {time} requested but only {available} available");
    Ok(data.index_axis(Axis(axis), time).to_owned())
}

fn time_axis_of(data: &Tensor) -> anyhow::Result<usize> {
    ensure!(
        data.ndim() >= 4,
        "Tensor of shape {:?} has no time axis",
        data.shape()
    );
    Ok(data.ndim() - 4)
}

/// Names of all zarr.zip archives in a directory, sorted.
pub fn list_archives(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut file_names = vec![];

    for entry in fs::read_dir(dir).with_context(|| format!("Listing {}", dir.display()))? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(ARCHIVE_SUFFIX) {
                file_names.push(name.to_string());
            }
        }
    }

    file_names.sort();
    Ok(file_names)
}

/// The sample id of an archive: its file name without `.zarr.zip`.
pub fn sample_id(file_name: &str) -> &str {
    file_name.strip_suffix(ARCHIVE_SUFFIX).unwrap_or(file_name)
}
