use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;

use crate::error::ApiError;

pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

/// Text fields plus at most one file attachment, collected from a multipart
/// body.
pub struct FormData {
    fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl FormData {
    /// Drain a multipart stream. The field named `file_field` is treated as
    /// the attachment; everything else is read as text.
    pub async fn collect(mut mp: Multipart, file_field: &str) -> Result<Self, ApiError> {
        let mut fields = HashMap::new();
        let mut file = None;

        while let Some(field) = mp
            .next_field()
            .await
            .map_err(|e| ApiError::validation("body", format!("malformed multipart body: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == file_field {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::validation("photo", format!("failed to read attachment: {e}"))
                })?;
                // An empty file input submits a zero-length part; treat it
                // as absent.
                if !bytes.is_empty() {
                    file = Some(UploadedFile { filename, bytes });
                }
            } else {
                let value = field.text().await.map_err(|e| {
                    ApiError::validation("body", format!("failed to read field: {e}"))
                })?;
                fields.insert(name, value);
            }
        }

        Ok(Self { fields, file })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn require(&self, name: &'static str) -> Result<&str, ApiError> {
        self.get(name)
            .ok_or_else(|| ApiError::validation(name, format!("{name} is required")))
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::extract::{FromRequest, Request};

    use super::*;

    const BOUNDARY: &str = "form-data-test-boundary";

    fn text_part(name: &str, value: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
    }

    fn file_part(name: &str, filename: &str, bytes: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: image/jpeg\r\n\r\n{bytes}\r\n"
        )
    }

    async fn collect_body(parts: String) -> FormData {
        let body = format!("{parts}--{BOUNDARY}--\r\n");
        let req = Request::builder()
            .method("POST")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let mp = Multipart::from_request(req, &()).await.unwrap();
        FormData::collect(mp, "photo").await.unwrap()
    }

    #[tokio::test]
    async fn text_fields_only_has_no_file() {
        let form = collect_body(format!(
            "{}{}",
            text_part("name", "Ana"),
            text_part("email", "ana@example.com")
        ))
        .await;
        assert!(form.file.is_none());
        assert_eq!(form.get("name"), Some("Ana"));
        assert_eq!(form.get("email"), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn empty_file_part_is_treated_as_absent() {
        // An empty file input still submits a zero-length photo part.
        let form = collect_body(format!(
            "{}{}",
            text_part("name", "Ana"),
            file_part("photo", "a.jpg", "")
        ))
        .await;
        assert!(form.file.is_none());
        assert_eq!(form.get("name"), Some("Ana"));
    }

    #[tokio::test]
    async fn file_part_is_captured_with_its_filename() {
        let form = collect_body(file_part("photo", "holiday.jpg", "fake image bytes")).await;
        let file = form.file.expect("attachment present");
        assert_eq!(file.filename, "holiday.jpg");
        assert_eq!(file.bytes.as_ref(), b"fake image bytes");
    }

    fn form_with(fields: &[(&str, &str)]) -> FormData {
        FormData {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            file: None,
        }
    }

    #[test]
    fn require_rejects_missing_and_empty_fields() {
        let form = form_with(&[("name", "Ana"), ("email", "")]);
        assert_eq!(form.require("name").unwrap(), "Ana");
        assert!(matches!(
            form.require("email"),
            Err(ApiError::Validation { field: "email", .. })
        ));
        assert!(form.require("password").is_err());
    }
}
