pub mod error;
pub mod keys;
pub mod mapping;
pub mod model;
pub mod option_set;

pub use error::{CoreError, Result};
pub use keys::{ImageKey, StepKey};
pub use model::{AttributeSet, ImageDef, PluginAssemblyDef, PluginTypeDef, StepDef};
pub use option_set::{
    ExecutionMode, ImageType, IsolationMode, SourceType, Stage, SupportedDeployment,
};
