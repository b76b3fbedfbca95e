use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::{AppError, AppResult};
use crate::uploads::UploadedFile;

/// A fully buffered multipart body: text fields plus any number of files
/// per field name.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            let file_name = field.file_name().map(ToString::to_string);

            match file_name {
                Some(file_name) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?
                        .to_vec();
                    form.files
                        .entry(name)
                        .or_default()
                        .push(UploadedFile { file_name, bytes });
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Present and not blank, trimmed.
    pub fn required(&self, name: &str) -> AppResult<String> {
        self.optional(name)
            .ok_or_else(|| AppError::BadRequest(format!("Missing required field: {name}")))
    }

    pub fn optional(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
    }

    pub fn files(&self, name: &str) -> &[UploadedFile] {
        self.files.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    #[cfg(test)]
    pub(crate) fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }
}

/// Budgets are whole, non-negative amounts.
pub fn parse_budget(raw: &str) -> AppResult<i64> {
    match raw.trim().parse::<i64>() {
        Ok(n) if n >= 0 => Ok(n),
        _ => Err(AppError::BadRequest(
            "Budget must be a non-negative whole number".into(),
        )),
    }
}
