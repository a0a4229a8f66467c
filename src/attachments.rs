//! Image attachments: one optional file per animal, referenced by the animal's
//! `imageUrl` as `images/<file>`. Files are named after the upload instant in
//! nanoseconds plus the original extension.
//!
//! Write order on replace is file, then pointer, then old-file cleanup, so a
//! stored pointer always names a complete file on disk.

use std::fmt::Display;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::domain::Animal;
use crate::error::{AppError, AppResult};
use crate::repository::AnimalRepository;

/// Leading segment of every stored image pointer, also the static route prefix.
pub const IMAGE_URL_PREFIX: &str = "images";

pub const MAX_UPLOAD_BYTES: u64 = 10 << 20;

const CREATE_ATTEMPTS: usize = 5;

pub struct AttachmentManager {
    dir: PathBuf,
    animals: Arc<dyn AnimalRepository>,
    max_bytes: u64,
}

fn io_error(context: &str, e: std::io::Error) -> AppError {
    AppError::storage("attachment_io", format!("{}: {}", context, e))
}

/// `.ext` of the uploaded file name, or empty when it has none we are willing to keep.
pub fn extension_of(original_filename: &str) -> String {
    Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 16 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

pub fn image_url_for(file_name: &str) -> String { format!("{}/{}", IMAGE_URL_PREFIX, file_name) }

fn timestamp_name(ext: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{}{}", nanos, ext)
}

impl AttachmentManager {
    pub fn new<P: Into<PathBuf>>(dir: P, animals: Arc<dyn AnimalRepository>) -> Self {
        Self { dir: dir.into(), animals, max_bytes: MAX_UPLOAD_BYTES }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn dir(&self) -> &Path { &self.dir }

    /// Disk path of a bare file name inside the attachment directory. Anything
    /// that could step outside it yields `None`.
    pub fn resolve_file(&self, file_name: &str) -> Option<PathBuf> {
        if file_name.is_empty() || file_name.starts_with('.') || file_name.contains(|c| c == '/' || c == '\\') { return None; }
        if Path::new(file_name).file_name().and_then(|n| n.to_str()) != Some(file_name) { return None; }
        Some(self.dir.join(file_name))
    }

    /// Disk path behind a stored `imageUrl`.
    pub fn resolve(&self, image_url: &str) -> Option<PathBuf> {
        let rest = image_url.strip_prefix(IMAGE_URL_PREFIX)?.strip_prefix('/')?;
        self.resolve_file(rest)
    }

    pub fn exists(&self, image_url: &str) -> bool {
        self.resolve(image_url).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Store `content` as the animal's new image and point the animal at it.
    ///
    /// The returned path is only handed out once the pointer update succeeded.
    /// Any failure before that removes the new file and leaves the animal and its
    /// previous image untouched.
    pub async fn replace<S, E>(&self, animal: &Animal, original_filename: &str, content: S) -> AppResult<String>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| io_error("create attachment dir", e))?;

        let ext = extension_of(original_filename);
        let (file_name, path, mut file) = self.create_unique(&ext).await?;

        let mut content = std::pin::pin!(content);
        let mut written: u64 = 0;
        let res: AppResult<()> = async {
            while let Some(chunk) = content.next().await {
                let chunk = chunk.map_err(|e| AppError::user("upload_interrupted", e.to_string()))?;
                written += chunk.len() as u64;
                if written > self.max_bytes {
                    return Err(AppError::user("upload_too_large", format!("upload exceeds {} bytes", self.max_bytes)));
                }
                file.write_all(&chunk).await.map_err(|e| io_error("write attachment", e))?;
            }
            file.flush().await.map_err(|e| io_error("flush attachment", e))?;
            file.sync_all().await.map_err(|e| io_error("sync attachment", e))?;
            Ok(())
        }
        .await;
        drop(file);
        if let Err(e) = res {
            remove_quietly(&path).await;
            return Err(e);
        }

        let image_url = image_url_for(&file_name);
        if let Err(e) = self.animals.set_image_url(&animal.id_string(), &image_url).await {
            remove_quietly(&path).await;
            return Err(e);
        }
        info!(animal = %animal.id_string(), image = %image_url, bytes = written, "image stored");

        if animal.has_image() && animal.image_url != image_url {
            self.discard(&animal.image_url).await;
        }
        Ok(image_url)
    }

    /// Best-effort removal of the file behind `image_url`. Never fails.
    pub async fn discard(&self, image_url: &str) {
        if image_url.is_empty() { return; }
        let Some(path) = self.resolve(image_url) else {
            warn!(image = %image_url, "not removing image outside the attachment directory");
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(image = %image_url, "image removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => debug!(image = %image_url, "image already gone"),
            Err(e) => warn!(image = %image_url, "image removal failed: {}", e),
        }
    }

    async fn create_unique(&self, ext: &str) -> AppResult<(String, PathBuf, tokio::fs::File)> {
        let mut last_err = None;
        for _ in 0..CREATE_ATTEMPTS {
            let name = timestamp_name(ext);
            let path = self.dir.join(&name);
            match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(f) => return Ok((name, path, f)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => last_err = Some(e),
                Err(e) => return Err(io_error("create attachment", e)),
            }
        }
        Err(io_error("create attachment", last_err.unwrap_or_else(|| std::io::Error::from(ErrorKind::AlreadyExists))))
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), "could not remove unused attachment: {}", e);
        }
    }
}
