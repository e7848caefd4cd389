use std::{
    fs::{self, File},
    io,
    path::Path,
};

use flate2::read::GzDecoder;
use log::info;
use ndarray::{Array2, s};

use super::{DataSet, idx};
use crate::{MlErr, Result};

/// The amount of pixels of every image.
pub const IMAGE_SIZE: usize = 28 * 28;

/// The amount of digit classes.
pub const CLASSES: usize = 10;

/// How many of the first training samples are held out for validation by default.
pub const VALIDATION_SIZE: usize = 5000;

const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

/// The MNIST handwritten digits, split in train, validation and test sets.
#[derive(Debug)]
pub struct Mnist {
    pub train: DataSet,
    pub validation: Option<DataSet>,
    pub test: DataSet,
}

impl Mnist {
    /// Loads the four MNIST idx files from `data_dir`, plain or gzipped.
    ///
    /// # Arguments
    /// * `data_dir` - The directory holding the files.
    /// * `validation_size` - How many of the first training samples go to the validation set.
    /// * `seed` - The seed every split shuffles with.
    ///
    /// # Returns
    /// The loaded splits or an error if a file is missing or malformed.
    pub fn load<P: AsRef<Path>>(data_dir: P, validation_size: usize, seed: u64) -> Result<Self> {
        let dir = data_dir.as_ref();

        let (train_x, train_y) = load_pair(dir, TRAIN_IMAGES, TRAIN_LABELS)?;
        let (test_x, test_y) = load_pair(dir, TEST_IMAGES, TEST_LABELS)?;

        if validation_size >= train_x.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "validation split",
                got: validation_size,
                expected: train_x.nrows(),
            });
        }

        let validation = if validation_size > 0 {
            let x = train_x.slice(s![..validation_size, ..]).to_owned();
            let y = train_y.slice(s![..validation_size, ..]).to_owned();
            Some(DataSet::new(x, y, seed.wrapping_add(1))?)
        } else {
            None
        };

        let x = train_x.slice(s![validation_size.., ..]).to_owned();
        let y = train_y.slice(s![validation_size.., ..]).to_owned();
        let train = DataSet::new(x, y, seed)?;
        let test = DataSet::new(test_x, test_y, seed.wrapping_add(2))?;

        info!(
            train = train.len(),
            validation = validation_size,
            test = test.len();
            "loaded mnist from {}",
            dir.display()
        );

        Ok(Self {
            train,
            validation,
            test,
        })
    }

    /// Makes sure the four idx files in `data_dir` are usable, decompressing the gzipped
    /// ones in place. Nothing is fetched over the network.
    ///
    /// # Arguments
    /// * `data_dir` - The directory holding the files.
    ///
    /// # Returns
    /// An error if a file is missing or malformed.
    pub fn prepare<P: AsRef<Path>>(data_dir: P) -> Result<()> {
        let dir = data_dir.as_ref();

        for name in [TRAIN_IMAGES, TRAIN_LABELS, TEST_IMAGES, TEST_LABELS] {
            let path = dir.join(name);
            let gz = idx::gz_path(&path);

            if !path.exists() && gz.exists() {
                info!("extracting {}", gz.display());
                extract(&gz, &path)?;
            }
        }

        load_pair(dir, TRAIN_IMAGES, TRAIN_LABELS)?;
        load_pair(dir, TEST_IMAGES, TEST_LABELS)?;

        info!("mnist is ready in {}", dir.display());
        Ok(())
    }
}

/// Decompresses `gz` next to `path` and only moves it into place once it is complete.
fn extract(gz: &Path, path: &Path) -> io::Result<()> {
    let tmp = path.with_extension("tmp");

    let res = File::open(gz)
        .and_then(|file| io::copy(&mut GzDecoder::new(file), &mut File::create(&tmp)?))
        .and_then(|_| fs::rename(&tmp, path));

    if res.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    res
}

fn load_pair(dir: &Path, images: &str, labels: &str) -> Result<(Array2<f32>, Array2<f32>)> {
    let x = idx::parse_images(images, &idx::read(&dir.join(images))?)?;
    let y = idx::parse_labels(labels, &idx::read(&dir.join(labels))?, CLASSES)?;

    if x.nrows() != y.nrows() {
        return Err(MlErr::SizeMismatch {
            what: "label count",
            got: y.nrows(),
            expected: x.nrows(),
        });
    }

    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use std::{io::Write, path::PathBuf};

    use flate2::{Compression, write::GzEncoder};

    use super::*;
    use crate::dataset::{
        BatchSource,
        idx::tests::{images_bytes, labels_bytes},
    };

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mnist-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_plain(dir: &Path, name: &str, bytes: &[u8]) {
        fs::write(dir.join(name), bytes).unwrap();
    }

    fn write_gz(dir: &Path, name: &str, bytes: &[u8]) {
        let file = File::create(dir.join(format!("{name}.gz"))).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap();
    }

    fn write_set(dir: &Path, gz: bool) {
        let write: fn(&Path, &str, &[u8]) = if gz { write_gz } else { write_plain };

        let train: Vec<[u8; 4]> = (0..8).map(|i| [i * 10; 4]).collect();
        write(dir, TRAIN_IMAGES, &images_bytes(&train));
        write(dir, TRAIN_LABELS, &labels_bytes(&[0, 1, 2, 3, 4, 5, 6, 7]));
        write(dir, TEST_IMAGES, &images_bytes(&[[0; 4], [255; 4]]));
        write(dir, TEST_LABELS, &labels_bytes(&[8, 9]));
    }

    #[test]
    fn validation_takes_the_first_training_samples() {
        let dir = temp_dir("split");
        write_set(&dir, false);

        let mnist = Mnist::load(&dir, 3, 0).unwrap();
        assert_eq!(mnist.train.len(), 5);
        assert_eq!(mnist.test.len(), 2);

        let validation = mnist.validation.unwrap();
        assert_eq!(validation.len(), 3);

        // Unshuffled storage keeps the original order, labels 0, 1, 2.
        let classes: Vec<_> = validation
            .labels()
            .rows()
            .into_iter()
            .map(|r| r.iter().position(|&v| v == 1.).unwrap())
            .collect();
        assert_eq!(classes, [0, 1, 2]);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn gzipped_files_are_read_and_prepared() {
        let dir = temp_dir("gz");
        write_set(&dir, true);

        let mut mnist = Mnist::load(&dir, 0, 0).unwrap();
        assert!(mnist.validation.is_none());

        let (x, y) = mnist.train.next_batch(8);
        assert_eq!(x.dim(), (8, 4));
        assert_eq!(y.dim(), (8, CLASSES));

        Mnist::prepare(&dir).unwrap();
        assert!(dir.join(TRAIN_IMAGES).exists());
        assert!(dir.join(TEST_LABELS).exists());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn corrupted_archive_leaves_nothing_behind() {
        let dir = temp_dir("corrupted");
        write_set(&dir, false);
        fs::remove_file(dir.join(TRAIN_IMAGES)).unwrap();
        fs::write(dir.join(format!("{TRAIN_IMAGES}.gz")), b"not gzip at all").unwrap();

        assert!(Mnist::prepare(&dir).is_err());
        assert!(!dir.join(TRAIN_IMAGES).exists());
        assert!(!dir.join(TRAIN_IMAGES).with_extension("tmp").exists());

        write_gz(&dir, TRAIN_IMAGES, &images_bytes(&[[7; 4]; 8]));
        Mnist::prepare(&dir).unwrap();
        assert!(dir.join(TRAIN_IMAGES).exists());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_files_fail() {
        let dir = temp_dir("missing");

        let err = Mnist::prepare(&dir).unwrap_err();
        assert!(matches!(err, MlErr::Io(ref e) if e.kind() == io::ErrorKind::NotFound));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn oversized_validation_split_fails() {
        let dir = temp_dir("oversized");
        write_set(&dir, false);

        assert!(matches!(
            Mnist::load(&dir, 8, 0),
            Err(MlErr::SizeMismatch { what: "validation split", .. })
        ));

        fs::remove_dir_all(dir).unwrap();
    }
}
