use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Ceiling on the decoded image payload. Checked against decoded bytes, not
/// the base64 text, which runs ~33% larger.
pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image payload is not decodable base64")]
    InvalidPayload,

    #[error("Image exceeds the 2 MiB limit")]
    PayloadTooLarge,

    #[error("Unsupported image type")]
    UnsupportedType,

    #[error("Image storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stores profile images under `<upload_path>/<profile_dir>`.
///
/// Files are written under fresh server-generated names, so client-supplied
/// filenames never touch the filesystem and concurrent uploads cannot
/// collide.
pub struct ImageStore {
    profile_folder: PathBuf,
}

impl ImageStore {
    #[must_use]
    pub fn new(upload_path: &str, profile_dir: &str) -> Self {
        Self {
            profile_folder: Path::new(upload_path).join(profile_dir),
        }
    }

    #[must_use]
    pub fn profile_folder(&self) -> &Path {
        &self.profile_folder
    }

    /// Validate and persist a base64 image payload.
    ///
    /// Pipeline order: decode, size ceiling (2 MiB inclusive), magic-byte
    /// sniff against the JPEG/PNG allow-list, then a durably written file
    /// under a random name. The new filename is returned only after the
    /// write completes; nothing is persisted when any check fails.
    pub async fn store(&self, raw_base64: &str) -> Result<String, ImageError> {
        let bytes = BASE64
            .decode(raw_base64)
            .map_err(|_| ImageError::InvalidPayload)?;

        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::PayloadTooLarge);
        }

        // Trust the bytes, not client metadata: sniff the real type.
        let kind = infer::get(&bytes).ok_or(ImageError::UnsupportedType)?;
        let extension = match kind.mime_type() {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            _ => return Err(ImageError::UnsupportedType),
        };

        if !self.profile_folder.exists() {
            fs::create_dir_all(&self.profile_folder).await?;
        }

        let filename = format!("{}.{extension}", random_basename());
        let file_path = self.profile_folder.join(&filename);

        fs::write(&file_path, &bytes).await?;

        debug!(path = %file_path.display(), size = bytes.len(), "Stored profile image");

        Ok(filename)
    }

    /// Delete a stored image. Discarding a reference that no longer exists
    /// is a no-op, not an error.
    pub async fn discard(&self, filename: &str) {
        let file_path = self.profile_folder.join(filename);
        match fs::remove_file(&file_path).await {
            Ok(()) => debug!(path = %file_path.display(), "Discarded profile image"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %file_path.display(), "Failed to discard profile image: {e}"),
        }
    }
}

/// Random 16-byte hex basename, independent of anything the client sent.
fn random_basename() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();

    bytes.iter().fold(String::with_capacity(32), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
