use std::fmt;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use crate::db::models::DEFAULT_PROFILE_PIC;
use crate::error::AppResult;

pub const POSTS_DIR: &str = "posts";
pub const PROFILES_DIR: &str = "profiles";

/// A file taken from a multipart body, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Non-fatal failure to remove a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageWarning {
    pub path: String,
    pub reason: String,
}

impl fmt::Display for StorageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not remove {}: {}", self.path, self.reason)
    }
}

/// Files live under `root`; everything recorded in the database is a
/// `/`-separated path relative to it.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let rel = Path::new(relative);
        let safe = rel.components().all(|c| matches!(c, Component::Normal(_)));
        (safe && !relative.is_empty()).then(|| self.root.join(rel))
    }

    /// Store one file as `<dir>/<owner>_<name>`. Files without a name are
    /// skipped and yield `None`. An existing file is never overwritten; a
    /// numeric suffix is added instead.
    pub fn save(&self, dir: &str, owner: &str, file: &UploadedFile) -> AppResult<Option<String>> {
        if file.file_name.trim().is_empty() {
            return Ok(None);
        }

        let target_dir = self.root.join(dir);
        std::fs::create_dir_all(&target_dir)?;

        let base = sanitize_file_name(&format!("{}_{}", owner, file.file_name));
        let (stem, ext) = split_extension(&base);

        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                base.clone()
            } else {
                format!("{stem}-{attempt}{ext}")
            };
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(target_dir.join(&name))
            {
                Ok(mut out) => {
                    out.write_all(&file.bytes)?;
                    let relative = format!("{dir}/{name}");
                    tracing::debug!("Stored upload {} ({} bytes)", relative, file.bytes.len());
                    return Ok(Some(relative));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Store every named file. If any write fails, the files already
    /// written by this call are removed before the error is returned.
    pub fn save_all(&self, dir: &str, owner: &str, files: &[UploadedFile]) -> AppResult<Vec<String>> {
        let mut saved = Vec::new();
        for file in files {
            match self.save(dir, owner, file) {
                Ok(Some(path)) => saved.push(path),
                Ok(None) => {}
                Err(e) => {
                    self.remove_all(&saved);
                    return Err(e);
                }
            }
        }
        Ok(saved)
    }

    pub fn remove(&self, relative: &str) -> Result<(), StorageWarning> {
        let path = self.resolve(relative).ok_or_else(|| StorageWarning {
            path: relative.to_string(),
            reason: "path escapes the upload root".to_string(),
        })?;
        std::fs::remove_file(&path).map_err(|e| StorageWarning {
            path: relative.to_string(),
            reason: e.to_string(),
        })
    }

    /// Best-effort removal. Failures are logged and returned, never raised.
    /// The shared default profile picture is left alone.
    pub fn remove_all(&self, paths: &[String]) -> Vec<StorageWarning> {
        paths
            .iter()
            .filter(|p| p.as_str() != DEFAULT_PROFILE_PIC)
            .filter_map(|p| self.remove(p).err())
            .inspect(|warning| tracing::warn!("{}", warning))
            .collect()
    }
}

/// Reduce an uploaded name to a safe single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = last
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}
