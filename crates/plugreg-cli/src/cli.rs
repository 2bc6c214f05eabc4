use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use plugreg_registration::{RegistrationMode, RegistrationOptions};

#[derive(Parser)]
#[command(name = "plugreg")]
#[command(about = "plugreg: register plugin assemblies, types, steps and images")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ~/.plugreg/config.toml)
    #[arg(short, long, global = true, env = "PLUGREG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Environment URL (overrides config and PLUGREG__URL)
    #[arg(short, long, global = true)]
    pub url: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register an assembly and its mapped types, steps and images
    Register(RegisterArgs),
    /// Show what `register` would delete and upsert, without writing
    Plan(RegisterArgs),
    /// Print the identity read from an assembly's metadata
    Inspect(InspectArgs),
    /// Manage CLI configuration
    Config(ConfigArgs),
}

#[derive(Clone, Copy, ValueEnum, Default, Debug, PartialEq, Eq)]
#[value(rename_all = "lower")]
pub enum RegistrationType {
    /// Create or update; never delete
    #[default]
    Upsert,
    /// Delete components missing from the mapping, then upsert
    Delsert,
}

impl From<RegistrationType> for RegistrationMode {
    fn from(value: RegistrationType) -> Self {
        match value {
            RegistrationType::Upsert => RegistrationMode::Upsert,
            RegistrationType::Delsert => RegistrationMode::Delsert,
        }
    }
}

#[derive(clap::Args, Clone)]
pub struct RegisterArgs {
    /// Registration type
    #[arg(long, value_enum, ignore_case = true, default_value = "upsert")]
    pub registration_type: RegistrationType,

    /// Path to the built plugin assembly
    #[arg(long)]
    pub assembly_path: PathBuf,

    /// Register one assembly per plugin type
    #[arg(long, num_args = 0..=1, default_missing_value = "true", default_value_t = false, action = ArgAction::Set)]
    pub use_split_assembly: bool,

    /// Project file the split assemblies are built from
    #[arg(long)]
    pub project_file_path: Option<PathBuf>,

    /// The assembly contains workflow activities
    #[arg(long, num_args = 0..=1, default_missing_value = "true", default_value_t = false, action = ArgAction::Set)]
    pub is_workflow_activity_assembly: bool,

    /// Mapping document describing types, steps and images
    #[arg(long)]
    pub mapping_json_path: Option<PathBuf>,

    /// Solution every registered component is added to
    #[arg(long)]
    pub solution_name: Option<String>,

    /// Plan only; same as the `plan` command
    #[arg(long)]
    pub dry_run: bool,
}

impl RegisterArgs {
    pub fn to_options(&self) -> RegistrationOptions {
        let mut options =
            RegistrationOptions::new(self.registration_type.into(), &self.assembly_path)
                .workflow_activity(self.is_workflow_activity_assembly);
        options.use_split_assembly = self.use_split_assembly;
        options.project_file_path = self.project_file_path.clone();
        options.mapping_path = self.mapping_json_path.clone();
        options.solution_name = self.solution_name.clone();
        options
    }
}

#[derive(clap::Args)]
pub struct InspectArgs {
    /// Path to the assembly
    pub assembly: PathBuf,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration (secrets masked)
    Show,
    /// Print the default config file location
    Path,
}
