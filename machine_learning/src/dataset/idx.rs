use std::{
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use ndarray::Array2;

use crate::{MlErr, Result};

pub const IMAGES_MAGIC: u32 = 2051;
pub const LABELS_MAGIC: u32 = 2049;

/// Returns the path of the gzip compressed variant of `path`.
pub fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Reads an idx file, falling back to its `.gz` variant when the plain file is missing.
///
/// # Arguments
/// * `path` - The path of the uncompressed file.
///
/// # Returns
/// The uncompressed bytes of the file or an io error if neither variant exists.
pub fn read(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();

    if path.exists() {
        File::open(path)?.read_to_end(&mut bytes)?;
        return Ok(bytes);
    }

    let gz = gz_path(path);
    if gz.exists() {
        GzDecoder::new(File::open(&gz)?).read_to_end(&mut bytes)?;
        return Ok(bytes);
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("neither {} nor {} exist", path.display(), gz.display()),
    )
    .into())
}

/// Parses an idx3 image file into one row of pixels per image, scaled to `[0, 1]`.
///
/// # Arguments
/// * `file` - The name of the file, used in errors.
/// * `bytes` - The contents of the file.
///
/// # Returns
/// The images matrix or an error if the file is malformed.
pub fn parse_images(file: &str, bytes: &[u8]) -> Result<Array2<f32>> {
    check_magic(file, bytes, IMAGES_MAGIC)?;

    let count = read_u32(file, bytes, 4)? as usize;
    let rows = read_u32(file, bytes, 8)? as usize;
    let cols = read_u32(file, bytes, 12)? as usize;
    let (pixels_per_image, len) = rows
        .checked_mul(cols)
        .and_then(|n| Some((n, n.checked_mul(count)?)))
        .ok_or_else(|| invalid(file, format!("{count}x{rows}x{cols} images overflow")))?;
    let pixels = body(file, bytes, 16, len)?;

    let data = pixels.iter().map(|&p| p as f32 / 255.).collect();
    Array2::from_shape_vec((count, pixels_per_image), data).map_err(|e| invalid(file, e.to_string()))
}

/// Parses an idx1 label file into one-hot rows.
///
/// # Arguments
/// * `file` - The name of the file, used in errors.
/// * `bytes` - The contents of the file.
/// * `classes` - The amount of classes to encode.
///
/// # Returns
/// The one-hot labels matrix or an error if the file is malformed.
pub fn parse_labels(file: &str, bytes: &[u8], classes: usize) -> Result<Array2<f32>> {
    check_magic(file, bytes, LABELS_MAGIC)?;

    let count = read_u32(file, bytes, 4)? as usize;
    let labels = body(file, bytes, 8, count)?;

    let mut one_hot = Array2::zeros((count, classes));
    for (i, &label) in labels.iter().enumerate() {
        if label as usize >= classes {
            return Err(MlErr::LabelOutOfRange { label, classes });
        }
        one_hot[[i, label as usize]] = 1.;
    }

    Ok(one_hot)
}

fn check_magic(file: &str, bytes: &[u8], expected: u32) -> Result<()> {
    let magic = read_u32(file, bytes, 0)?;
    if magic != expected {
        return Err(invalid(
            file,
            format!("bad magic number {magic}, expected {expected}"),
        ));
    }

    Ok(())
}

fn read_u32(file: &str, bytes: &[u8], offset: usize) -> Result<u32> {
    bytes
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or_else(|| invalid(file, format!("truncated header at byte {offset}")))
}

fn body<'a>(file: &str, bytes: &'a [u8], offset: usize, len: usize) -> Result<&'a [u8]> {
    let body = &bytes[offset.min(bytes.len())..];
    if body.len() != len {
        return Err(invalid(
            file,
            format!("expected {len} bytes of data, found {}", body.len()),
        ));
    }

    Ok(body)
}

fn invalid(file: &str, reason: String) -> MlErr {
    MlErr::InvalidIdx {
        file: file.to_string(),
        reason,
    }
}
