//! Desired-state loading: introspect the binary, then read the mapping
//! document when one is given.

use std::path::Path;

use plugreg_core::{PluginAssemblyDef, mapping};

use crate::error::{RegistrationError, Result};
use crate::introspect::{AssemblyInfo, AssemblyIntrospector};

/// The shared binary plus the tree to converge the remote state to.
#[derive(Debug, Clone)]
pub struct DesiredState {
    pub assembly: AssemblyInfo,
    pub tree: PluginAssemblyDef,
}

/// Builds the desired tree.
///
/// Without a mapping document the tree is name-only: the assembly is
/// registered and nothing below it is touched. With one, its `Name` must be
/// the introspected assembly name unless `allow_name_mismatch` is set (split
/// mode registers per-type binaries under their own names).
pub fn load_desired(
    introspector: &dyn AssemblyIntrospector,
    assembly_path: &Path,
    mapping_path: Option<&Path>,
    allow_name_mismatch: bool,
) -> Result<DesiredState> {
    let assembly = introspector.inspect(assembly_path)?;
    tracing::info!(
        assembly = %assembly.name,
        version = %assembly.version,
        "Loaded assembly"
    );

    let Some(mapping_path) = mapping_path else {
        let tree = PluginAssemblyDef::name_only(&assembly.name);
        return Ok(DesiredState { assembly, tree });
    };

    let tree = mapping::load(mapping_path)?;
    if !allow_name_mismatch && !tree.name.eq_ignore_ascii_case(&assembly.name) {
        return Err(RegistrationError::precondition(format!(
            "mapping document describes assembly '{}' but {} is '{}'",
            tree.name,
            assembly_path.display(),
            assembly.name
        )));
    }
    if let Some(declared) = stale_version(&tree, &assembly) {
        tracing::warn!(
            mapping = %mapping_path.display(),
            declared = %declared,
            version = %assembly.version,
            "Mapping document version differs from the assembly; registering the assembly version"
        );
    }
    if !tree.has_type_detail() {
        tracing::info!(mapping = %mapping_path.display(), "No mapping found for types");
    }

    Ok(DesiredState { assembly, tree })
}

/// The mapping's declared version when it disagrees with the binary.
fn stale_version<'a>(tree: &'a PluginAssemblyDef, assembly: &AssemblyInfo) -> Option<&'a str> {
    tree.version
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != assembly.version)
}
