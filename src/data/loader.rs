use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result, bail};
use matfile::{MatFile, NumericData};
use ndarray::{Array, Array2, Array3, Dimension, Ix2, Ix3, ShapeBuilder};
use ndarray_npy::{ReadNpyError, ReadableElement, read_npy};

use super::model::{GroundTruth, SpectralCube};
use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a spectral cube.  Dispatch by extension.
///
/// Supported formats:
/// * `.mat` – MATLAB v5 file; `key` names the (height, width, bands) array
/// * `.npy` – NumPy array of rank 3; `key` is ignored
pub fn load_cube(path: &Path, key: &str) -> Result<SpectralCube> {
    let data = match extension(path).as_str() {
        "mat" => {
            let mat = open_mat(path)?;
            let array = find_array(&mat, key)?;
            let size = array.size();
            if size.len() != 3 {
                bail!(PipelineError::ShapeMismatch {
                    what: "spectral cube must be a 3-D array",
                    expected: vec![0, 0, 0],
                    actual: size.clone(),
                });
            }
            let values = numeric_to_f32(key, array.data())?;
            // MATLAB stores arrays column-major.
            Array3::from_shape_vec((size[0], size[1], size[2]).f(), values)
                .context("reshaping cube data")?
        }
        "npy" => read_npy_cube(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    log::debug!("loaded cube {:?} from {}", data.dim(), path.display());
    Ok(SpectralCube::new(data))
}

/// Load a ground-truth label raster.  Dispatch by extension, as [`load_cube`].
///
/// Labels must be non-negative integers; float rasters are accepted when every
/// value is integral.
pub fn load_ground_truth(path: &Path, key: &str) -> Result<GroundTruth> {
    let labels = match extension(path).as_str() {
        "mat" => {
            let mat = open_mat(path)?;
            let array = find_array(&mat, key)?;
            let size = array.size();
            if size.len() != 2 {
                bail!(PipelineError::ShapeMismatch {
                    what: "ground truth must be a 2-D array",
                    expected: vec![0, 0],
                    actual: size.clone(),
                });
            }
            let values = numeric_to_labels(key, array.data())?;
            Array2::from_shape_vec((size[0], size[1]).f(), values)
                .context("reshaping ground truth data")?
        }
        "npy" => read_npy_labels(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    log::debug!("loaded ground truth {:?} from {}", labels.dim(), path.display());
    Ok(GroundTruth::new(labels))
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// MATLAB loader
// ---------------------------------------------------------------------------

fn open_mat(path: &Path) -> Result<MatFile> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    MatFile::parse(BufReader::new(file))
        .map_err(|e| anyhow::anyhow!("{e:?}"))
        .with_context(|| format!("parsing MATLAB file {}", path.display()))
}

fn find_array<'a>(mat: &'a MatFile, name: &str) -> Result<&'a matfile::Array> {
    mat.find_by_name(name).ok_or_else(|| {
        PipelineError::MissingArray {
            name: name.to_string(),
            available: mat.arrays().iter().map(|a| a.name().to_string()).collect(),
        }
        .into()
    })
}

fn numeric_to_f32(name: &str, data: &NumericData) -> Result<Vec<f32>> {
    let values = match data {
        NumericData::Int8 { real, imag: None } => real.iter().map(|&v| f32::from(v)).collect(),
        NumericData::UInt8 { real, imag: None } => real.iter().map(|&v| f32::from(v)).collect(),
        NumericData::Int16 { real, imag: None } => real.iter().map(|&v| f32::from(v)).collect(),
        NumericData::UInt16 { real, imag: None } => real.iter().map(|&v| f32::from(v)).collect(),
        NumericData::Int32 { real, imag: None } => real.iter().map(|&v| v as f32).collect(),
        NumericData::UInt32 { real, imag: None } => real.iter().map(|&v| v as f32).collect(),
        NumericData::Int64 { real, imag: None } => real.iter().map(|&v| v as f32).collect(),
        NumericData::UInt64 { real, imag: None } => real.iter().map(|&v| v as f32).collect(),
        NumericData::Single { real, imag: None } => real.clone(),
        NumericData::Double { real, imag: None } => real.iter().map(|&v| v as f32).collect(),
        _ => bail!(PipelineError::UnsupportedElement {
            name: name.to_string(),
            detail: "complex data".to_string(),
        }),
    };
    Ok(values)
}

fn numeric_to_labels(name: &str, data: &NumericData) -> Result<Vec<u32>> {
    let values: Vec<f64> = match data {
        NumericData::Int8 { real, imag: None } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::UInt8 { real, imag: None } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::Int16 { real, imag: None } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::UInt16 { real, imag: None } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::Int32 { real, imag: None } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::UInt32 { real, imag: None } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::Int64 { real, imag: None } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt64 { real, imag: None } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Single { real, imag: None } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::Double { real, imag: None } => real.clone(),
        _ => bail!(PipelineError::UnsupportedElement {
            name: name.to_string(),
            detail: "complex data".to_string(),
        }),
    };
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| to_label(value, index))
        .collect()
}

fn to_label(value: f64, index: usize) -> Result<u32> {
    if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        bail!(PipelineError::InvalidLabel { value, index });
    }
    Ok(value as u32)
}

// ---------------------------------------------------------------------------
// NumPy loader
// ---------------------------------------------------------------------------

/// Read `path` as an array of element type `A`, or `None` when the file holds
/// a different dtype.
fn read_npy_as<A, D>(path: &Path) -> Result<Option<Array<A, D>>>
where
    A: ReadableElement,
    D: Dimension,
{
    match read_npy::<_, Array<A, D>>(path) {
        Ok(array) => Ok(Some(array)),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

fn read_npy_cube(path: &Path) -> Result<Array3<f32>> {
    if let Some(a) = read_npy_as::<f32, Ix3>(path)? {
        return Ok(a);
    }
    if let Some(a) = read_npy_as::<f64, Ix3>(path)? {
        return Ok(a.mapv(|v| v as f32));
    }
    if let Some(a) = read_npy_as::<i16, Ix3>(path)? {
        return Ok(a.mapv(f32::from));
    }
    if let Some(a) = read_npy_as::<u16, Ix3>(path)? {
        return Ok(a.mapv(f32::from));
    }
    if let Some(a) = read_npy_as::<i32, Ix3>(path)? {
        return Ok(a.mapv(|v| v as f32));
    }
    if let Some(a) = read_npy_as::<u8, Ix3>(path)? {
        return Ok(a.mapv(f32::from));
    }
    bail!(PipelineError::UnsupportedElement {
        name: path.display().to_string(),
        detail: "expected f32, f64, i16, u16, i32 or u8".to_string(),
    })
}

fn read_npy_labels(path: &Path) -> Result<Array2<u32>> {
    fn convert<T: Copy>(a: Array2<T>, f: impl Fn(T) -> f64) -> Result<Array2<u32>> {
        let dim = a.raw_dim();
        let values = a
            .iter()
            .enumerate()
            .map(|(index, &v)| to_label(f(v), index))
            .collect::<Result<Vec<u32>>>()?;
        Ok(Array2::from_shape_vec(dim, values)?)
    }

    if let Some(a) = read_npy_as::<u8, Ix2>(path)? {
        return Ok(a.mapv(u32::from));
    }
    if let Some(a) = read_npy_as::<u16, Ix2>(path)? {
        return Ok(a.mapv(u32::from));
    }
    if let Some(a) = read_npy_as::<u32, Ix2>(path)? {
        return Ok(a);
    }
    if let Some(a) = read_npy_as::<i16, Ix2>(path)? {
        return convert(a, f64::from);
    }
    if let Some(a) = read_npy_as::<i32, Ix2>(path)? {
        return convert(a, f64::from);
    }
    if let Some(a) = read_npy_as::<i64, Ix2>(path)? {
        return convert(a, |v| v as f64);
    }
    bail!(PipelineError::UnsupportedElement {
        name: path.display().to_string(),
        detail: "expected u8, u16, u32, i16, i32 or i64".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;
    use ndarray_npy::write_npy;

    #[test]
    fn npy_cube_round_trips_through_int16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.npy");
        let cube = Array::from_shape_fn((2, 3, 4), |(r, c, b)| (r * 12 + c * 4 + b) as i16);
        write_npy(&path, &cube).unwrap();

        let loaded = load_cube(&path, "ignored").unwrap();
        assert_eq!(loaded.data().dim(), (2, 3, 4));
        assert_eq!(loaded.data()[[1, 2, 3]], 23.0);
    }

    #[test]
    fn npy_ground_truth_accepts_unsigned_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gt.npy");
        let gt = Array::from_shape_fn((3, 2), |(r, c)| (r * 2 + c) as u8);
        write_npy(&path, &gt).unwrap();

        let loaded = load_ground_truth(&path, "ignored").unwrap();
        assert_eq!(loaded.labels()[[2, 1]], 5);
        assert_eq!(loaded.max_label(), 5);
    }

    #[test]
    fn negative_labels_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gt.npy");
        let gt = Array::from_shape_vec((1, 3), vec![0i32, 2, -1]).unwrap();
        write_npy(&path, &gt).unwrap();

        let err = load_ground_truth(&path, "ignored").unwrap_err();
        let domain = err.downcast_ref::<PipelineError>().unwrap();
        assert!(matches!(domain, PipelineError::InvalidLabel { index: 2, .. }));
    }

    #[test]
    fn cube_of_wrong_rank_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.npy");
        write_npy(&path, &Array2::<f32>::zeros((2, 2))).unwrap();
        assert!(load_cube(&path, "ignored").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_cube(&dir.path().join("absent.npy"), "x").is_err());
        assert!(load_ground_truth(&dir.path().join("absent.mat"), "x").is_err());
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let err = load_cube(Path::new("scene.tif"), "x").unwrap_err();
        assert!(err.to_string().contains(".tif"));
    }

    #[test]
    fn fractional_label_is_invalid() {
        assert!(to_label(3.0, 0).is_ok());
        assert!(to_label(2.5, 7).is_err());
    }
}
