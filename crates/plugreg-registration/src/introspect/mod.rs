//! Assembly introspection: identity and content of a compiled binary.

mod metadata;

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::error::{RegistrationError, Result};

pub use metadata::{AssemblyIdentity, MetadataError, read_assembly_identity};

/// Identity and bytes of one compiled assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyInfo {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub culture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_token: Option<String>,
    pub path: PathBuf,
    #[serde(skip)]
    pub content: Vec<u8>,
}

impl AssemblyInfo {
    /// Directory the binary was loaded from.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Content in the encoding the platform stores.
    pub fn content_base64(&self) -> String {
        STANDARD.encode(&self.content)
    }

    pub fn content_len(&self) -> usize {
        self.content.len()
    }
}

/// Reads an assembly's identity and content from disk.
pub trait AssemblyIntrospector: Send + Sync {
    /// # Errors
    ///
    /// `AssemblyNotFound` when the path cannot be read, `InvalidAssembly` when
    /// it is not a managed assembly.
    fn inspect(&self, path: &Path) -> Result<AssemblyInfo>;
}

/// Introspector reading ECMA-335 metadata from the file itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileIntrospector;

impl AssemblyIntrospector for FileIntrospector {
    fn inspect(&self, path: &Path) -> Result<AssemblyInfo> {
        let content =
            std::fs::read(path).map_err(|e| RegistrationError::assembly_not_found(path, e))?;
        let identity = read_assembly_identity(&content)
            .map_err(|e| RegistrationError::invalid_assembly(path, e.to_string()))?;

        tracing::debug!(
            path = %path.display(),
            assembly = %identity.name,
            version = %identity.version,
            bytes = content.len(),
            "Introspected assembly"
        );

        Ok(AssemblyInfo {
            name: identity.name,
            version: identity.version,
            culture: identity.culture,
            public_key_token: identity.public_key_token,
            path: path.to_path_buf(),
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::metadata::tests::synthetic_assembly;
    use super::*;

    #[test]
    fn test_file_introspector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Contoso.Plugins.dll");
        let image = synthetic_assembly("Contoso.Plugins", [1, 0, 0, 0], "", &[]);
        std::fs::write(&path, &image).unwrap();

        let info = FileIntrospector.inspect(&path).unwrap();
        assert_eq!(info.name, "Contoso.Plugins");
        assert_eq!(info.version, "1.0.0.0");
        assert_eq!(info.directory(), dir.path());
        assert_eq!(info.content_len(), image.len());
        assert_eq!(info.content_base64(), STANDARD.encode(&image));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileIntrospector
            .inspect(&dir.path().join("Missing.dll"))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::AssemblyNotFound { .. }));
    }

    #[test]
    fn test_not_an_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readme.dll");
        std::fs::write(&path, "plain text").unwrap();
        let err = FileIntrospector.inspect(&path).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidAssembly { .. }));
    }
}
