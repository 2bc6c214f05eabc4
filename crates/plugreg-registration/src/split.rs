//! Split-assembly mode: one binary, and one assembly record, per type.
//!
//! Each type's binary is built into a sibling of the project directory named
//! after the project directory plus the type name, mirroring the shared
//! binary's output path below it:
//!
//! ```text
//! shared:   /src/Contoso.Plugins/bin/Release/Contoso.Plugins.dll
//! per type: /src/Contoso.PluginsAccountPlugin/bin/Release/AccountPlugin.dll
//! ```

use std::path::{Path, PathBuf};

use plugreg_core::PluginTypeDef;

use crate::error::{RegistrationError, Result};
use crate::introspect::{AssemblyInfo, AssemblyIntrospector};

/// Expected location of the binary for `type_name`.
///
/// When the shared binary is not built below the project directory the type's
/// binary is looked up next to it.
pub fn split_assembly_path(assembly_dir: &Path, project_file: &Path, type_name: &str) -> PathBuf {
    let file_name = format!("{type_name}.dll");
    let Some(project_dir) = project_file.parent() else {
        return assembly_dir.join(file_name);
    };
    match assembly_dir.strip_prefix(project_dir) {
        Ok(rest) => {
            let mut dir = project_dir.as_os_str().to_os_string();
            dir.push(type_name);
            PathBuf::from(dir).join(rest).join(file_name)
        }
        Err(_) => assembly_dir.join(file_name),
    }
}

/// Locates and introspects every type's binary.
///
/// Runs before any remote write so a missing binary aborts the run cleanly.
pub fn locate_split_assemblies(
    introspector: &dyn AssemblyIntrospector,
    shared: &AssemblyInfo,
    project_file: &Path,
    types: &[PluginTypeDef],
) -> Result<Vec<AssemblyInfo>> {
    types
        .iter()
        .map(|plugin_type| {
            let path = split_assembly_path(shared.directory(), project_file, &plugin_type.name);
            if !path.is_file() {
                return Err(RegistrationError::MissingSplitAssembly {
                    type_name: plugin_type.name.clone(),
                    path,
                });
            }
            let info = introspector.inspect(&path)?;
            tracing::debug!(
                plugin_type = %plugin_type.name,
                assembly = %info.name,
                path = %path.display(),
                "Located split assembly"
            );
            Ok(info)
        })
        .collect()
}
