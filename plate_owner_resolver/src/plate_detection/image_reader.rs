use std::fs;
use std::path::{Path, PathBuf};

use opencv::core::Vector;
use opencv::imgcodecs::{imencode, imread, imwrite, IMREAD_COLOR};
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;

use crate::error::ImageError;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Expands the inputs into image files. Files are taken as given,
/// directories contribute their images sorted by name (not recursive).
pub fn collect_image_paths<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<PathBuf>, ImageError> {
    let mut paths = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if !input.is_dir() {
            paths.push(input.to_path_buf());
            continue;
        }
        let listing = |source: std::io::Error| ImageError::Listing {
            path: input.display().to_string(),
            source,
        };
        let mut found = Vec::new();
        for entry in fs::read_dir(input).map_err(listing)? {
            let path = entry.map_err(listing)?.path();
            if path.is_file() && is_image(&path) {
                found.push(path);
            }
        }
        found.sort();
        paths.extend(found);
    }
    Ok(paths)
}

/// Loads a BGR image. Missing or undecodable files are an error.
pub fn read_image(path: &Path) -> Result<Mat, ImageError> {
    let image = imread(&path.to_string_lossy(), IMREAD_COLOR)?;
    if image.empty() {
        return Err(ImageError::Unreadable(path.display().to_string()));
    }
    Ok(image)
}

pub fn write_image(path: &Path, image: &Mat) -> Result<(), ImageError> {
    if !imwrite(&path.to_string_lossy(), image, &Vector::new())? {
        return Err(ImageError::Unwritable(path.display().to_string()));
    }
    Ok(())
}

/// JPEG bytes of the image.
pub fn encode_jpeg(image: &Mat) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vector::<u8>::new();
    if !imencode(".jpg", image, &mut buffer, &Vector::new())? {
        return Err(ImageError::Unwritable("<jpeg buffer>".to_string()));
    }
    Ok(buffer.to_vec())
}

/// `<out_dir>/<stem>_annotated.jpg`
pub fn annotated_path(out_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    out_dir.join(format!("{stem}_annotated.jpg"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};

    fn sample() -> Mat {
        Mat::new_rows_cols_with_default(40, 60, CV_8UC3, Scalar::new(10.0, 120.0, 240.0, 0.0))
            .expect("mat")
    }

    #[test]
    fn collects_images_from_directory_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.png", "a.JPG", "notes.txt", "c.bmp"] {
            fs::write(dir.path().join(name), b"x").expect("write");
        }
        fs::create_dir(dir.path().join("nested.jpg")).expect("mkdir");

        let paths = collect_image_paths(&[dir.path()]).expect("collect");
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().expect("name").to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "c.bmp"]);
    }

    #[test]
    fn explicit_files_are_kept_in_order() {
        let paths = collect_image_paths(&["z.jpg", "a.jpg"]).expect("collect");
        assert_eq!(paths, vec![PathBuf::from("z.jpg"), PathBuf::from("a.jpg")]);
    }

    #[test]
    fn writes_and_reads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("frame.png");
        write_image(&path, &sample()).expect("write");
        let image = read_image(&path).expect("read");
        assert_eq!((image.rows(), image.cols()), (40, 60));
        assert_eq!(image.channels(), 3);
    }

    #[test]
    fn missing_file_is_unreadable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = read_image(&dir.path().join("missing.jpg"));
        assert!(matches!(result, Err(ImageError::Unreadable(_))));
    }

    #[test]
    fn encodes_jpeg() {
        let bytes = encode_jpeg(&sample()).expect("encode");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn annotated_name_uses_stem() {
        let path = annotated_path(Path::new("/out"), Path::new("/in/car 1.png"));
        assert_eq!(path, PathBuf::from("/out/car 1_annotated.jpg"));
    }
}
