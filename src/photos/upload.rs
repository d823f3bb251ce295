use bytes::Bytes;
use image::{DynamicImage, ImageFormat};

use crate::error::ApiError;
use crate::photos::names::split_filename;

/// A validated upload: size-checked, decoded, with its basename/extension
/// split out and the re-encode format pinned down. Pure data; nothing has
/// been written anywhere yet.
#[derive(Debug)]
pub struct AcceptedUpload {
    pub image: DynamicImage,
    pub basename: String,
    pub ext: String,
    pub format: ImageFormat,
}

impl AcceptedUpload {
    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Validate a candidate attachment. Checks the size cap first, then that the
/// bytes decode as an image. No side effects.
pub fn accept(bytes: &Bytes, original_filename: &str, max_kb: u64) -> Result<AcceptedUpload, ApiError> {
    if bytes.len() as u64 > max_kb * 1024 {
        return Err(ApiError::FileTooLarge { limit_kb: max_kb });
    }

    let guessed = image::guess_format(bytes).map_err(|_| ApiError::NotAnImage)?;
    let image = image::load_from_memory(bytes).map_err(|_| ApiError::NotAnImage)?;

    let (basename, ext) = split_filename(original_filename);
    // Prefer the declared extension; fall back to what the bytes actually are.
    let ext = ext.unwrap_or_else(|| {
        guessed
            .extensions_str()
            .first()
            .copied()
            .unwrap_or("jpg")
            .to_string()
    });
    let format = ImageFormat::from_extension(&ext).unwrap_or(guessed);

    Ok(AcceptedUpload {
        image,
        basename,
        ext,
        format,
    })
}
