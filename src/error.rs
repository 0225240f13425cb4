use rootcause::Report;
use thiserror::Error;

use crate::bake::BuildError;
use crate::export::ExportError;
use crate::profile::RegistryError;
use crate::service::ServiceError;
use crate::surface::BindError;
use crate::surface::SyncError;

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
}

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("Array build failed: {0}")]
    Build(#[from] BuildError),
    #[error("Shader binding refused: {0}")]
    Bind(#[from] BindError),
    #[error("Terrain sync failed: {0}")]
    Sync(#[from] SyncError),
    #[error("Layer registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Surface service error: {0}")]
    Service(#[from] ServiceError),
    #[error("Export failed: {0}")]
    Export(Report<ExportError>),
    #[cfg(feature = "json")]
    #[error("Manifest error: {0}")]
    Manifest(Report<crate::manifest::ManifestError>),
    #[cfg(feature = "json")]
    #[error("Error serializing or deserializing json: {err}")]
    SerdeJson {
        #[from]
        err: serde_json::Error,
    },
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error")]
    IoError(#[from] std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

macro_rules! error_from {
    ($($(#[$meta:meta])* $source:ty),* $(,)?) => {
        $(
            $(#[$meta])*
            impl From<$source> for Error {
                fn from(x: $source) -> Error {
                    Error { kind: x.into() }
                }
            }
        )*
    };
}

error_from!(
    BuildError,
    BindError,
    SyncError,
    RegistryError,
    ServiceError,
    #[cfg(feature = "json")]
    serde_json::Error,
    image::ImageError,
    std::io::Error,
);

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error { kind }
    }
}

impl From<Report<ExportError>> for Error {
    fn from(report: Report<ExportError>) -> Error {
        ErrorKind::Export(report).into()
    }
}

#[cfg(feature = "json")]
impl From<Report<crate::manifest::ManifestError>> for Error {
    fn from(report: Report<crate::manifest::ManifestError>) -> Error {
        ErrorKind::Manifest(report).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_convert_and_keep_their_attachments() {
        let report = Report::new(ExportError::Io("denied".to_string())).attach("path: out/albedo.dds");
        let err = Error::from(report);
        assert!(matches!(&err.kind, ErrorKind::Export(r) if matches!(r.current_context(), ExportError::Io(_))));
        let text = err.to_string();
        assert!(text.starts_with("Export failed:"));
        assert!(text.contains("denied"));
    }

    #[test]
    fn plain_errors_convert_through_their_kind() {
        let err = Error::from(BindError::MissingWeightMaps);
        assert!(matches!(err.kind, ErrorKind::Bind(BindError::MissingWeightMaps)));
    }
}
