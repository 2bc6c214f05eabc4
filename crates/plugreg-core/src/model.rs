//! Desired-state tree: Assembly → Type → Step → Image.
//!
//! The same types are the schema of a mapping document. Every level rejects
//! unknown fields, and only the fields the platform cannot default are
//! required. `Option<Vec<_>>` collections keep "omitted" and "empty" apart:
//! an omitted `PluginTypes` or `Steps` means no detail is available, an empty
//! list means there is nothing registered below that node.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::keys::{ImageKey, StepKey};
use crate::option_set::{
    ExecutionMode, ImageType, IsolationMode, SourceType, Stage, SupportedDeployment,
};

/// Root of the desired-state tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct PluginAssemblyDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolation_mode: Option<IsolationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_types: Option<Vec<PluginTypeDef>>,
}

impl PluginAssemblyDef {
    /// Tree for a binary registered without a mapping document.
    pub fn name_only(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            version: None,
            description: None,
            isolation_mode: None,
            source_type: None,
            plugin_types: None,
        }
    }

    pub fn isolation_mode(&self) -> IsolationMode {
        self.isolation_mode.unwrap_or_default()
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type.unwrap_or_default()
    }

    /// Declared types, or an empty slice when the document carries no type detail.
    pub fn types(&self) -> &[PluginTypeDef] {
        self.plugin_types.as_deref().unwrap_or_default()
    }

    pub fn has_type_detail(&self) -> bool {
        self.plugin_types.is_some()
    }

    /// Declared type whose type name matches `type_name`, ignoring case.
    pub fn find_type(&self, type_name: &str) -> Option<&PluginTypeDef> {
        self.types()
            .iter()
            .find(|t| t.type_name().eq_ignore_ascii_case(type_name))
    }
}

/// A plugin or workflow-activity class inside an assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct PluginTypeDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_activity_group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<StepDef>>,
}

impl PluginTypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            friendly_name: None,
            type_name: None,
            description: None,
            workflow_activity_group_name: None,
            steps: None,
        }
    }

    /// Fully qualified type name, falling back to the declared name.
    pub fn type_name(&self) -> &str {
        self.type_name.as_deref().unwrap_or(&self.name)
    }

    pub fn friendly_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.name)
    }

    /// Declared steps, or an empty slice for name-only registration.
    pub fn steps(&self) -> &[StepDef] {
        self.steps.as_deref().unwrap_or_default()
    }

    /// `false` when the document omitted `Steps` entirely.
    pub fn has_step_detail(&self) -> bool {
        self.steps.is_some()
    }

    pub fn with_steps(mut self, steps: Vec<StepDef>) -> Self {
        self.steps = Some(steps);
        self
    }
}

/// Event subscription binding a type to a message on an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct StepDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    pub message_name: String,
    pub primary_entity_name: String,
    pub stage: Stage,
    pub mode: ExecutionMode,
    pub rank: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtering_attributes: Option<AttributeSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_configuration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_deployment: Option<SupportedDeployment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub async_auto_delete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonating_user_fullname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageDef>>,
}

impl StepDef {
    pub fn new(
        name: impl Into<String>,
        message_name: impl Into<String>,
        primary_entity_name: impl Into<String>,
        stage: Stage,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            message_name: message_name.into(),
            primary_entity_name: primary_entity_name.into(),
            stage,
            mode,
            rank: 1,
            filtering_attributes: None,
            custom_configuration: None,
            description: None,
            supported_deployment: None,
            async_auto_delete: None,
            impersonating_user_fullname: None,
            images: None,
        }
    }

    pub fn key(&self) -> StepKey {
        StepKey::new(
            &self.message_name,
            &self.primary_entity_name,
            self.stage,
            self.mode,
        )
    }

    pub fn images(&self) -> &[ImageDef] {
        self.images.as_deref().unwrap_or_default()
    }

    pub fn supported_deployment(&self) -> SupportedDeployment {
        self.supported_deployment.unwrap_or_default()
    }

    /// Auto-delete only applies to asynchronous steps.
    pub fn async_auto_delete(&self) -> bool {
        self.mode == ExecutionMode::Asynchronous && self.async_auto_delete.unwrap_or(false)
    }

    pub fn with_images(mut self, images: Vec<ImageDef>) -> Self {
        self.images = Some(images);
        self
    }
}

/// Entity snapshot passed to a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ImageDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub image_type: ImageType,
    pub entity_alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_property_name: Option<String>,
}

impl ImageDef {
    pub fn new(image_type: ImageType, entity_alias: impl Into<String>) -> Self {
        Self {
            id: None,
            name: None,
            image_type,
            entity_alias: entity_alias.into(),
            attributes: None,
            message_property_name: None,
        }
    }

    pub fn key(&self) -> ImageKey {
        ImageKey::new(self.image_type, &self.entity_alias)
    }

    /// Display name, defaulting to the entity alias.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.entity_alias)
    }

    /// Message property the image is taken from for the given message.
    pub fn message_property_name(&self, message_name: &str) -> String {
        if let Some(name) = &self.message_property_name {
            return name.clone();
        }
        default_message_property(message_name).to_string()
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(AttributeSet::from_iter(attributes));
        self
    }
}

fn default_message_property(message_name: &str) -> &'static str {
    if message_name.eq_ignore_ascii_case("Create") {
        "Id"
    } else if message_name.eq_ignore_ascii_case("SetState")
        || message_name.eq_ignore_ascii_case("SetStateDynamicEntity")
    {
        "EntityMoniker"
    } else {
        "Target"
    }
}

/// Ordered set of attribute logical names.
///
/// Documents may spell it as a comma-separated string or as an array. It is
/// written back as the comma-separated form the platform stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet(Vec<String>);

impl AttributeSet {
    pub fn parse(value: &str) -> Self {
        Self::from_iter(value.split(','))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.0.iter().any(|a| a.eq_ignore_ascii_case(attribute))
    }

    /// Comma-separated form; `None` when empty (all attributes).
    pub fn to_platform_string(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.join(","))
        }
    }
}

impl<S: Into<String>> FromIterator<S> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set: Vec<String> = Vec::new();
        for attribute in iter {
            let attribute = attribute.into().trim().to_ascii_lowercase();
            if !attribute.is_empty() && !set.contains(&attribute) {
                set.push(attribute);
            }
        }
        Self(set)
    }
}

impl Serialize for AttributeSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.join(","))
    }
}

impl<'de> Deserialize<'de> for AttributeSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Joined(String),
            List(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Joined(value) => Self::parse(&value),
            Raw::List(values) => Self::from_iter(values),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_set_normalizes() {
        let set = AttributeSet::parse(" Name, statuscode,,name ");
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_platform_string().as_deref(), Some("name,statuscode"));
        assert!(set.contains("StatusCode"));
        assert_eq!(AttributeSet::default().to_platform_string(), None);
    }

    #[test]
    fn test_attribute_set_deserializes_both_forms() {
        let joined: AttributeSet = serde_json::from_str("\"name,statuscode\"").unwrap();
        let list: AttributeSet = serde_json::from_str("[\"name\", \"statuscode\"]").unwrap();
        assert_eq!(joined, list);
    }

    #[test]
    fn test_message_property_defaults() {
        let image = ImageDef::new(ImageType::PostImage, "PostImage");
        assert_eq!(image.message_property_name("Create"), "Id");
        assert_eq!(image.message_property_name("SetState"), "EntityMoniker");
        assert_eq!(image.message_property_name("Update"), "Target");

        let mut explicit = image.clone();
        explicit.message_property_name = Some("Target".into());
        assert_eq!(explicit.message_property_name("Create"), "Target");
    }

    #[test]
    fn test_type_defaults() {
        let plugin_type = PluginTypeDef::new("Contoso.Plugins.AccountPlugin");
        assert_eq!(plugin_type.type_name(), "Contoso.Plugins.AccountPlugin");
        assert_eq!(plugin_type.friendly_name(), "Contoso.Plugins.AccountPlugin");
        assert!(!plugin_type.has_step_detail());
        assert!(plugin_type.steps().is_empty());

        let with_steps = plugin_type.with_steps(Vec::new());
        assert!(with_steps.has_step_detail());
    }

    #[test]
    fn test_find_type_matches_type_name() {
        let mut named = PluginTypeDef::new("AccountPlugin");
        named.type_name = Some("Contoso.Plugins.AccountPlugin".into());
        let mut assembly = PluginAssemblyDef::name_only("Contoso.Plugins");
        assembly.plugin_types = Some(vec![named, PluginTypeDef::new("ContactPlugin")]);

        let found = assembly.find_type("contoso.plugins.accountplugin").unwrap();
        assert_eq!(found.name, "AccountPlugin");
        assert!(assembly.find_type("AccountPlugin").is_none());
        assert!(assembly.find_type("CONTACTPLUGIN").is_some());
    }

    #[test]
    fn test_async_auto_delete_only_for_async() {
        let mut step = StepDef::new(
            "s",
            "Update",
            "account",
            Stage::PostOperation,
            ExecutionMode::Synchronous,
        );
        step.async_auto_delete = Some(true);
        assert!(!step.async_auto_delete());
        step.mode = ExecutionMode::Asynchronous;
        assert!(step.async_auto_delete());
    }
}
