//! Plugin registration engine.
//!
//! Converges the remote registration of a plugin assembly (its types, their
//! processing steps and the steps' entity images) to a desired tree built from
//! the binary itself and an optional mapping document.
//!
//! ```ignore
//! let registrar = Registrar::new(store);
//! let options = RegistrationOptions::new(RegistrationMode::Upsert, "Contoso.Plugins.dll")
//!     .with_mapping("mapping.json")
//!     .with_solution("Contoso");
//! let summary = registrar.run(&options).await?;
//! ```

pub mod error;
pub mod handles;
pub mod introspect;
pub mod loader;
pub mod options;
pub mod orchestrator;
pub mod plan;
pub mod progress;
pub mod reconcile;
pub mod split;
pub mod summary;
pub mod sweep;

pub use error::{RegistrationError, RemoteOperation, Result};
pub use handles::{AssemblyRef, ImageRef, Outcome, PluginTypeRef, StepRef, Upserted};
pub use introspect::{AssemblyInfo, AssemblyIntrospector, FileIntrospector};
pub use options::{RegistrationMode, RegistrationOptions};
pub use orchestrator::Registrar;
pub use plan::{RegistrationPlan, UpsertPlan, UpsertUnit};
pub use progress::{
    CollectingReporter, ProgressReporter, RegistrationEvent, SkipReason, TracingReporter,
};
pub use reconcile::{LookupCache, Reconciler};
pub use summary::{EntityCounts, RunSummary};
pub use sweep::{DeletionPlan, PlannedDeletion};
