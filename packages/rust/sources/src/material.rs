//! User-curated material directory provider.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use illustra_shared::{IllustraError, ImageAsset, ImageRequest, ImageSource, Result, UsedImageSet};

use crate::ImageProvider;

/// File extensions treated as images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// List image files directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(IllustraError::material_dir_invalid(dir, "does not exist"));
    }
    if !dir.is_dir() {
        return Err(IllustraError::material_dir_invalid(dir, "not a directory"));
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| IllustraError::material_dir_invalid(dir, e.to_string()))?;

    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_image_extension(path))
        .collect();
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Picks the first not-yet-used image from a material directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaterialDirectoryProvider;

impl MaterialDirectoryProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageProvider for MaterialDirectoryProvider {
    fn supports(&self, request: &ImageRequest) -> bool {
        matches!(request, ImageRequest::Directory { .. })
    }

    async fn try_resolve(
        &self,
        request: &ImageRequest,
        used: &UsedImageSet,
    ) -> Result<Option<ImageAsset>> {
        let ImageRequest::Directory { dir } = request else {
            return Ok(None);
        };

        let images = list_images(dir)?;
        debug!(dir = %dir.display(), count = images.len(), "material directory listed");

        Ok(images.into_iter().find_map(|path| {
            let identity = path.display().to_string();
            (!used.contains(&identity)).then(|| ImageAsset {
                local_path: path,
                source: ImageSource::MaterialDirectory,
                identity,
                hosted_url: None,
            })
        }))
    }

    fn name(&self) -> &str {
        "material"
    }
}
