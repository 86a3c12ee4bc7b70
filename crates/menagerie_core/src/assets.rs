//! Appearance asset export.
//!
//! Copies every variant's model source into the appearance service's asset
//! directory so the service can load models by appearance name.

use crate::inject::injector::Injector;
use crate::inject::InjectError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Subdirectory of the asset dir that holds exported models.
pub const ASSET_SUBDIR: &str = ".menagerie";
pub const ASSET_EXTENSION: &str = "bbmodel";

#[derive(Debug)]
pub enum AssetError {
    Inject(InjectError),
    ServiceUnavailable,
    NoAssetDir,
    UnsupportedSource(String),
    Io { path: PathBuf, source: std::io::Error },
}

impl Display for AssetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inject(err) => write!(f, "{err}"),
            Self::ServiceUnavailable => {
                write!(f, "assets can only be exported while the appearance service is available")
            }
            Self::NoAssetDir => write!(f, "no asset directory is configured"),
            Self::UnsupportedSource(source) => {
                write!(f, "unsupported appearance source: {source}")
            }
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl Error for AssetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Inject(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<InjectError> for AssetError {
    fn from(value: InjectError) -> Self {
        Self::Inject(value)
    }
}

/// Local path of a `file://` URL or plain path source.
pub fn source_path(source: &str) -> Result<PathBuf, AssetError> {
    if let Some(path) = source.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if source.contains("://") {
        return Err(AssetError::UnsupportedSource(source.to_string()));
    }
    Ok(PathBuf::from(source))
}

/// Exports every variant model of every injected kind.
///
/// `dir` overrides the directory reported by the appearance service.
/// Returns the written files in declaration order.
///
/// # Errors
/// - [`InjectError::NotReady`] before injection finished.
/// - [`AssetError::ServiceUnavailable`] while the service is absent.
/// - [`AssetError::NoAssetDir`] when neither `dir` nor the service names a
///   directory.
pub fn export_appearance_assets(
    injector: &Injector,
    dir: Option<&Path>,
) -> Result<Vec<PathBuf>, AssetError> {
    let started_at = Instant::now();
    let types = injector.types()?;
    let appearance = injector.appearance();
    if !appearance.is_available() {
        return Err(AssetError::ServiceUnavailable);
    }
    let root = dir
        .map(Path::to_path_buf)
        .or_else(|| appearance.asset_dir())
        .ok_or(AssetError::NoAssetDir)?;
    let target_dir = root.join(ASSET_SUBDIR);
    fs::create_dir_all(&target_dir).map_err(|source| AssetError::Io {
        path: target_dir.clone(),
        source,
    })?;

    let mut written = Vec::new();
    for entry in types.iter() {
        for variant in entry.declaration().variants().iter() {
            let from = source_path(variant.source())?;
            let to = target_dir.join(format!("{}.{ASSET_EXTENSION}", variant.appearance_name()));
            fs::copy(&from, &to).map_err(|source| AssetError::Io {
                path: from.clone(),
                source,
            })?;
            written.push(to);
        }
    }
    info!(
        "event=assets_export module=assets status=ok files={} duration_ms={}",
        written.len(),
        started_at.elapsed().as_millis()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::{source_path, AssetError};
    use std::path::PathBuf;

    #[test]
    fn file_urls_and_plain_paths_resolve_locally() {
        assert_eq!(
            source_path("file:///models/pale.bbmodel").expect("file url"),
            PathBuf::from("/models/pale.bbmodel")
        );
        assert_eq!(
            source_path("models/pale.bbmodel").expect("plain path"),
            PathBuf::from("models/pale.bbmodel")
        );
        assert!(matches!(
            source_path("https://example.com/pale.bbmodel"),
            Err(AssetError::UnsupportedSource(_))
        ));
    }
}
