use opencv::core::{Size, CV_8U};
use opencv::imgproc::{
    create_clahe, cvt_color, resize, threshold, COLOR_BGR2GRAY, COLOR_BGRA2GRAY, INTER_CUBIC,
    THRESH_BINARY_INV, THRESH_OTSU,
};
use opencv::prelude::*;

use crate::config::PreprocessConfig;

/// Turns a plate crop into the binary single channel image the
/// recognition engine reads.
///
/// Small crops are upscaled with cubic interpolation, then converted to
/// gray, equalized with CLAHE and binarized with an inverted Otsu
/// threshold. Pure function of the crop and the config.
pub fn preprocess_plate(crop: &Mat, config: &PreprocessConfig) -> opencv::Result<Mat> {
    let mut scaled = Mat::default();
    let source = if crop.rows() < config.min_height || crop.cols() < config.min_width {
        resize(
            crop,
            &mut scaled,
            Size::default(),
            config.upscale_factor,
            config.upscale_factor,
            INTER_CUBIC,
        )?;
        &scaled
    } else {
        crop
    };

    let gray = to_gray(source)?;

    let tiles = config.clahe_tile_grid;
    let mut clahe = create_clahe(config.clahe_clip_limit, Size::new(tiles, tiles))?;
    let mut equalized = Mat::default();
    clahe.apply(&gray, &mut equalized)?;

    let mut binary = Mat::default();
    threshold(
        &equalized,
        &mut binary,
        0.0,
        255.0,
        THRESH_BINARY_INV | THRESH_OTSU,
    )?;
    Ok(binary)
}

fn to_gray(image: &Mat) -> opencv::Result<Mat> {
    let mut gray = Mat::default();
    match image.channels() {
        1 => image.copy_to(&mut gray)?,
        4 => cvt_color(image, &mut gray, COLOR_BGRA2GRAY, 0)?,
        _ => cvt_color(image, &mut gray, COLOR_BGR2GRAY, 0)?,
    }
    if gray.depth() != CV_8U {
        let mut converted = Mat::default();
        gray.convert_to(&mut converted, CV_8U, 1.0, 0.0)?;
        return Ok(converted);
    }
    Ok(gray)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Rect, Scalar, CV_8UC1, CV_8UC3};
    use opencv::imgproc::{rectangle, LINE_8};

    fn plate_like(rows: i32, cols: i32, stroke: Rect) -> Mat {
        let mut image =
            Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(220.0)).expect("mat");
        rectangle(&mut image, stroke, Scalar::all(30.0), -1, LINE_8, 0).expect("draw");
        image
    }

    fn is_binary(image: &Mat) -> bool {
        let bytes = image.data_bytes().expect("continuous");
        bytes.iter().all(|&v| v == 0 || v == 255)
    }

    #[test]
    fn small_crop_is_upscaled_three_times() {
        let crop = plate_like(30, 80, Rect::new(20, 8, 40, 14));
        let out = preprocess_plate(&crop, &PreprocessConfig::default()).expect("preprocess");
        assert_eq!(out.rows(), 90);
        assert_eq!(out.cols(), 240);
        assert_eq!(out.typ(), CV_8UC1);
    }

    #[test]
    fn narrow_crop_is_upscaled_even_when_tall() {
        let crop = plate_like(60, 90, Rect::new(20, 20, 40, 20));
        let out = preprocess_plate(&crop, &PreprocessConfig::default()).expect("preprocess");
        assert_eq!((out.rows(), out.cols()), (180, 270));
    }

    #[test]
    fn large_crop_keeps_its_size() {
        let crop = plate_like(60, 200, Rect::new(40, 15, 120, 30));
        let out = preprocess_plate(&crop, &PreprocessConfig::default()).expect("preprocess");
        assert_eq!((out.rows(), out.cols()), (60, 200));
    }

    #[test]
    fn dark_strokes_become_foreground() {
        let crop = plate_like(60, 200, Rect::new(40, 15, 120, 30));
        let out = preprocess_plate(&crop, &PreprocessConfig::default()).expect("preprocess");
        assert!(is_binary(&out));
        let stroke = *out.at_2d::<u8>(30, 100).expect("pixel");
        let background = *out.at_2d::<u8>(3, 3).expect("pixel");
        assert_eq!(stroke, 255);
        assert_eq!(background, 0);
    }

    #[test]
    fn accepts_gray_input() {
        let mut crop =
            Mat::new_rows_cols_with_default(60, 200, CV_8UC1, Scalar::all(200.0)).expect("mat");
        rectangle(
            &mut crop,
            Rect::new(50, 20, 100, 20),
            Scalar::all(20.0),
            -1,
            LINE_8,
            0,
        )
        .expect("draw");
        let out = preprocess_plate(&crop, &PreprocessConfig::default()).expect("preprocess");
        assert_eq!(out.channels(), 1);
        assert_eq!(*out.at_2d::<u8>(30, 100).expect("pixel"), 255);
    }

    #[test]
    fn is_deterministic() {
        let crop = plate_like(30, 80, Rect::new(20, 8, 40, 14));
        let config = PreprocessConfig::default();
        let a = preprocess_plate(&crop, &config).expect("preprocess");
        let b = preprocess_plate(&crop, &config).expect("preprocess");
        assert_eq!(
            a.data_bytes().expect("continuous"),
            b.data_bytes().expect("continuous")
        );
    }
}
