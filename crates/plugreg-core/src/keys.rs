//! Natural keys used to match desired nodes against remote records.

use std::fmt;

use crate::option_set::{ExecutionMode, ImageType, Stage};

/// Identifies a step under its type: which event, on which entity, at which
/// stage, sync or async. Message and entity names compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepKey {
    pub message_name: String,
    pub primary_entity: String,
    pub stage: Stage,
    pub mode: ExecutionMode,
}

impl StepKey {
    pub fn new(
        message_name: &str,
        primary_entity: &str,
        stage: Stage,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            message_name: message_name.trim().to_ascii_lowercase(),
            primary_entity: primary_entity.trim().to_ascii_lowercase(),
            stage,
            mode,
        }
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.message_name, self.primary_entity, self.stage, self.mode
        )
    }
}

/// Identifies an image under its step. The alias compares case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    pub image_type: ImageType,
    pub entity_alias: String,
}

impl ImageKey {
    pub fn new(image_type: ImageType, entity_alias: &str) -> Self {
        Self {
            image_type,
            entity_alias: entity_alias.trim().to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.image_type, self.entity_alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_key_ignores_case() {
        let a = StepKey::new("Update", "Account", Stage::PostOperation, ExecutionMode::Synchronous);
        let b = StepKey::new("update", "account ", Stage::PostOperation, ExecutionMode::Synchronous);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "update/account/PostOperation/Synchronous");
    }

    #[test]
    fn test_step_key_distinguishes_mode() {
        let sync = StepKey::new("Update", "account", Stage::PostOperation, ExecutionMode::Synchronous);
        let not_sync = StepKey::new("Update", "account", Stage::PostOperation, ExecutionMode::Asynchronous);
        assert_ne!(sync, not_sync);
    }

    #[test]
    fn test_image_key_display() {
        let key = ImageKey::new(ImageType::PreImage, "PreImage");
        assert_eq!(key.to_string(), "PreImage/preimage");
    }

    #[test]
    fn test_image_key_ignores_alias_case() {
        assert_eq!(
            ImageKey::new(ImageType::PostImage, "img"),
            ImageKey::new(ImageType::PostImage, " IMG")
        );
        assert_ne!(
            ImageKey::new(ImageType::PostImage, "img"),
            ImageKey::new(ImageType::PreImage, "img")
        );
    }
}
