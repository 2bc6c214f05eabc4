//! Mapping document loading and validation.
//!
//! A mapping document is the JSON form of [`PluginAssemblyDef`]. Parsing fails
//! closed: unknown fields, missing required fields and unparseable enum values
//! all surface as [`CoreError::MalformedMapping`]. A parsed document is then
//! validated for duplicate natural keys and platform constraints before it is
//! handed to the reconciler.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::model::{PluginAssemblyDef, PluginTypeDef, StepDef};
use crate::option_set::{ExecutionMode, Stage};

/// Parses and validates a mapping document.
pub fn parse_str(json: &str) -> Result<PluginAssemblyDef> {
    let assembly: PluginAssemblyDef = serde_json::from_str(json)?;
    validate(&assembly)?;
    Ok(assembly)
}

/// Reads, parses and validates a mapping document from disk.
pub fn load(path: &Path) -> Result<PluginAssemblyDef> {
    let content = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let assembly = parse_str(&content)?;

    tracing::debug!(
        path = %path.display(),
        assembly = %assembly.name,
        types = assembly.types().len(),
        "Loaded mapping document"
    );

    Ok(assembly)
}

/// Checks the invariants serde cannot express.
pub fn validate(assembly: &PluginAssemblyDef) -> Result<()> {
    require_name("assembly", &assembly.name)?;

    // Types match remote records on their type name, ignoring case.
    let mut type_names = HashSet::new();
    for plugin_type in assembly.types() {
        require_name("type", &plugin_type.name)?;
        if !type_names.insert(plugin_type.type_name().trim().to_ascii_lowercase()) {
            return Err(CoreError::duplicate_key(
                "type",
                &assembly.name,
                plugin_type.type_name(),
            ));
        }
        validate_type(plugin_type)?;
    }

    Ok(())
}

fn validate_type(plugin_type: &PluginTypeDef) -> Result<()> {
    let mut step_keys = HashSet::new();
    for step in plugin_type.steps() {
        require_name("step", &step.name)?;
        require_name("step message", &step.message_name)?;
        require_name("step entity", &step.primary_entity_name)?;

        let key = step.key();
        if !step_keys.insert(key.clone()) {
            return Err(CoreError::duplicate_key(
                "step",
                &plugin_type.name,
                key.to_string(),
            ));
        }
        validate_step(step)?;
    }
    Ok(())
}

fn validate_step(step: &StepDef) -> Result<()> {
    if step.mode == ExecutionMode::Asynchronous && step.stage != Stage::PostOperation {
        return Err(CoreError::malformed(format!(
            "step '{}' is asynchronous but registered at stage {}; asynchronous steps must use PostOperation",
            step.name, step.stage
        )));
    }

    let mut image_keys = HashSet::new();
    for image in step.images() {
        require_name("image entity alias", &image.entity_alias)?;
        let key = image.key();
        if !image_keys.insert(key.clone()) {
            return Err(CoreError::duplicate_key("image", &step.name, key.to_string()));
        }
    }
    Ok(())
}

fn require_name(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CoreError::malformed(format!("{what} name must not be empty")));
    }
    Ok(())
}
