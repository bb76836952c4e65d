//! Raw `.npy` files to `f32` tensors
//!
//! Amplitudes arrive as `[N, H, W]` and leave as `[N, 1, H, W]`: convolutional
//! consumers rely on the channel-first 4-D layout. Velocities keep their shape.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use ndarray::{ArrayD, Axis, IxDyn, ShapeBuilder};
use npyz::{DType, NpyFile, Order, TypeChar};

use crate::{Error, Result};

/// Load a velocity file: cast to `f32`, shape unchanged.
///
/// # Errors
/// Returns error if the file cannot be read or holds an unsupported dtype
pub fn convert_velocity<P: AsRef<Path>>(path: P) -> Result<ArrayD<f32>> {
    read_npy(path)
}

/// Load an amplitude file and insert the channel axis.
///
/// # Errors
/// Returns [`Error::FormatError`] if the array is not exactly 3-D
pub fn convert_amplitude<P: AsRef<Path>>(path: P) -> Result<ArrayD<f32>> {
    let path = path.as_ref();
    let array = read_npy(path)?;
    insert_channel_axis(array).map_err(|reason| Error::format(path, reason))
}

/// Reshape `[N, H, W]` into `[N, 1, H, W]`.
///
/// # Errors
/// Returns a description of the offending shape for anything that is not 3-D
pub fn insert_channel_axis(array: ArrayD<f32>) -> std::result::Result<ArrayD<f32>, String> {
    if array.ndim() != 3 {
        return Err(format!(
            "expected amplitude array of shape [N, H, W], got {:?}",
            array.shape()
        ));
    }
    Ok(array.insert_axis(Axis(1)))
}

/// Read any numeric `.npy` file as `f32`.
///
/// # Errors
/// Returns error if the file is missing, malformed, or not a plain numeric dtype
pub fn read_npy<P: AsRef<Path>>(path: P) -> Result<ArrayD<f32>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let npy = NpyFile::new(BufReader::new(file))
        .map_err(|e| Error::format(path, format!("not a .npy file: {e}")))?;

    let shape: Vec<usize> = npy
        .shape()
        .iter()
        .map(|&d| usize::try_from(d))
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::format(path, format!("dimension too large: {e}")))?;
    let fortran = matches!(npy.order(), Order::Fortran);

    let values = read_values_as_f32(npy).map_err(|reason| Error::format(path, reason))?;

    let dim = IxDyn(&shape);
    let array = if fortran {
        ArrayD::from_shape_vec(dim.f(), values)
    } else {
        ArrayD::from_shape_vec(dim, values)
    }
    .map_err(|e| Error::format(path, format!("data does not match header shape: {e}")))?;

    Ok(array.as_standard_layout().into_owned())
}

#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
fn read_values_as_f32<R: Read>(npy: NpyFile<R>) -> std::result::Result<Vec<f32>, String> {
    let DType::Plain(type_str) = npy.dtype() else {
        return Err("structured or array dtypes are not supported".to_string());
    };

    let size = type_str.size_field();
    let decode = |e: std::io::Error| format!("failed to decode values: {e}");

    let values = match (type_str.type_char(), size) {
        (TypeChar::Float, 4) => npy.into_vec::<f32>().map_err(decode)?,
        (TypeChar::Float, 8) => cast(npy.into_vec::<f64>().map_err(decode)?, |v| v as f32),
        (TypeChar::Int, 1) => cast(npy.into_vec::<i8>().map_err(decode)?, f32::from),
        (TypeChar::Int, 2) => cast(npy.into_vec::<i16>().map_err(decode)?, f32::from),
        (TypeChar::Int, 4) => cast(npy.into_vec::<i32>().map_err(decode)?, |v| v as f32),
        (TypeChar::Int, 8) => cast(npy.into_vec::<i64>().map_err(decode)?, |v| v as f32),
        (TypeChar::Uint, 1) => cast(npy.into_vec::<u8>().map_err(decode)?, f32::from),
        (TypeChar::Uint, 2) => cast(npy.into_vec::<u16>().map_err(decode)?, f32::from),
        (TypeChar::Uint, 4) => cast(npy.into_vec::<u32>().map_err(decode)?, |v| v as f32),
        (TypeChar::Uint, 8) => cast(npy.into_vec::<u64>().map_err(decode)?, |v| v as f32),
        (TypeChar::Bool, _) => cast(npy.into_vec::<bool>().map_err(decode)?, |v| {
            if v {
                1.0
            } else {
                0.0
            }
        }),
        (other, size) => {
            return Err(format!("unsupported dtype {other:?} of {size} bytes"));
        }
    };

    Ok(values)
}

fn cast<T>(values: Vec<T>, f: impl Fn(T) -> f32) -> Vec<f32> {
    values.into_iter().map(f).collect()
}
