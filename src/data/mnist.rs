use std::{fs, path::Path};

use ndarray::{Array1, Array2};

use super::batch::Batch;
use crate::error::{HarnessErr, Result};

pub(super) const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
pub(super) const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
pub(super) const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
pub(super) const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

const IMAGES_MAGIC: u32 = 0x0000_0803;
const LABELS_MAGIC: u32 = 0x0000_0801;

/// Reads a pair of IDX image and label files into a batch.
pub(super) fn read_split(images: &Path, labels: &Path) -> Result<Batch> {
    let x = read_images(images)?;
    let y = read_labels(labels)?;

    if x.nrows() != y.len() {
        return Err(malformed(
            labels,
            format!("{} labels for {} images", y.len(), x.nrows()),
        ));
    }

    Batch::new(x, y)
}

fn read_images(path: &Path) -> Result<Array2<f32>> {
    let bytes = fs::read(path).map_err(|e| HarnessErr::io(path, e))?;
    let header = parse_header(path, &bytes, IMAGES_MAGIC, 3)?;
    let (n, rows, cols) = (header[0], header[1], header[2]);

    let pixels = &bytes[16..];
    let features = rows * cols;
    if pixels.len() != n * features {
        return Err(malformed(
            path,
            format!("expected {} pixels, got {}", n * features, pixels.len()),
        ));
    }

    let data = pixels.iter().map(|&p| p as f32 / 255.).collect();
    Array2::from_shape_vec((n, features), data).map_err(|e| malformed(path, e.to_string()))
}

fn read_labels(path: &Path) -> Result<Array1<usize>> {
    let bytes = fs::read(path).map_err(|e| HarnessErr::io(path, e))?;
    let header = parse_header(path, &bytes, LABELS_MAGIC, 1)?;

    let labels = &bytes[8..];
    if labels.len() != header[0] {
        return Err(malformed(
            path,
            format!("expected {} labels, got {}", header[0], labels.len()),
        ));
    }

    Ok(labels.iter().map(|&l| l as usize).collect())
}

/// Checks the magic number and returns the `dims` big endian dimensions following it.
fn parse_header(path: &Path, bytes: &[u8], magic: u32, dims: usize) -> Result<Vec<usize>> {
    let len = 4 * (dims + 1);
    if bytes.len() < len {
        return Err(malformed(path, "truncated header".into()));
    }

    let mut words = bytes[..len]
        .chunks_exact(4)
        .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]));

    let found = words.next().unwrap_or_default();
    if found != magic {
        return Err(malformed(
            path,
            format!("bad magic number {found:#010x}, expected {magic:#010x}"),
        ));
    }

    Ok(words.map(|w| w as usize).collect())
}

fn malformed(path: &Path, msg: String) -> HarnessErr {
    HarnessErr::MalformedDataset {
        path: path.to_path_buf(),
        msg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(magic: u32, dims: &[u32], body: &[u8]) -> Vec<u8> {
        let mut bytes = magic.to_be_bytes().to_vec();
        for d in dims {
            bytes.extend(d.to_be_bytes());
        }
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn reads_images_and_labels() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let labels = dir.path().join("labels");
        fs::write(&images, idx(IMAGES_MAGIC, &[2, 1, 2], &[0, 255, 51, 0])).unwrap();
        fs::write(&labels, idx(LABELS_MAGIC, &[2], &[3, 9])).unwrap();

        let batch = read_split(&images, &labels).unwrap();

        assert_eq!(batch.x().shape(), &[2, 2]);
        assert_eq!(batch.x()[[0, 1]], 1.0);
        assert_eq!(batch.x()[[1, 0]], 0.2);
        assert_eq!(batch.y().to_vec(), vec![3, 9]);
    }

    #[test]
    fn rejects_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels");

        fs::write(&path, idx(IMAGES_MAGIC, &[1], &[0])).unwrap();
        assert!(matches!(
            read_labels(&path),
            Err(HarnessErr::MalformedDataset { .. })
        ));

        fs::write(&path, idx(LABELS_MAGIC, &[3], &[0])).unwrap();
        assert!(read_labels(&path).is_err());

        fs::write(&path, [0, 0]).unwrap();
        assert!(read_labels(&path).is_err());

        assert!(matches!(
            read_labels(&dir.path().join("missing")),
            Err(HarnessErr::Io { .. })
        ));
    }
}
