use leptess::tesseract::TessApi;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use opencv::prelude::MatTraitConstManual;
use std::ffi::CString;

use super::TextRecognizer;
use crate::config::OcrConfig;
use crate::error::RecognitionError;

/// Single line plate reader backed by Tesseract.
pub struct TesseractOcr {
    ocr: TessApi,
    allowlist: Option<String>,
}

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Result<Self, RecognitionError> {
        let ocr = TessApi::new(Some(config.tessdata_dir.as_str()), &config.language).map_err(|e| {
            RecognitionError::Engine(format!(
                "cannot load tesseract language {} from {}: {:?}",
                config.language, config.tessdata_dir, e
            ))
        })?;
        let mut reader = Self {
            ocr,
            allowlist: None,
        };
        // 7 = treat the image as a single text line
        reader.set_variable("tessedit_pageseg_mode", "7")?;
        tracing::info!(
            tessdata = %config.tessdata_dir,
            language = %config.language,
            "tesseract initialised"
        );
        Ok(reader)
    }

    fn set_variable(&mut self, name: &str, value: &str) -> Result<(), RecognitionError> {
        let name_c = CString::new(name)
            .map_err(|e| RecognitionError::Engine(format!("invalid variable name {name}: {e}")))?;
        let value_c = CString::new(value)
            .map_err(|e| RecognitionError::Engine(format!("invalid value for {name}: {e}")))?;
        self.ocr
            .raw
            .set_variable(&name_c, &value_c)
            .map_err(|e| RecognitionError::Engine(format!("cannot set {name}: {e:?}")))
    }

    fn ensure_allowlist(&mut self, allowlist: &str) -> Result<(), RecognitionError> {
        if self.allowlist.as_deref() == Some(allowlist) {
            return Ok(());
        }
        self.set_variable("tessedit_char_whitelist", allowlist)?;
        self.allowlist = Some(allowlist.to_string());
        Ok(())
    }
}

impl TextRecognizer for TesseractOcr {
    fn recognize(&mut self, image: &Mat, allowlist: &str) -> Result<Vec<String>, RecognitionError> {
        if image.channels() != 1 {
            return Err(RecognitionError::Engine(format!(
                "expected a single channel image, got {} channels",
                image.channels()
            )));
        }
        if image.empty() {
            return Ok(Vec::new());
        }
        self.ensure_allowlist(allowlist)?;

        // Make it contiguous
        let contiguous;
        let image = if image.is_continuous() {
            image
        } else {
            contiguous = image.try_clone()?;
            &contiguous
        };

        let cols = image.cols();
        let rows = image.rows();
        self.ocr
            .raw
            .set_image(image.data_bytes()?, cols, rows, 1, cols)
            .map_err(|e| RecognitionError::Engine(format!("cannot set image: {e:?}")))?;
        let text = self
            .ocr
            .get_utf8_text()
            .map_err(|e| RecognitionError::Engine(format!("cannot read text: {e:?}")))?;

        tracing::debug!(text = %text.trim(), rows, cols, "ocr");
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}
