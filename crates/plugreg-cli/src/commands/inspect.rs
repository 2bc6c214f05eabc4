use std::path::Path;

use anyhow::Result;
use plugreg_registration::{AssemblyIntrospector, FileIntrospector};

use crate::cli::OutputFormat;
use crate::output;

pub fn inspect(assembly: &Path, format: OutputFormat) -> Result<()> {
    let info = FileIntrospector.inspect(assembly)?;
    output::print_assembly(&info, format)
}
