//! Graft Core - mutation models, edits, patches and variants
//!
//! The program-facing half of graft:
//! - Parses target files into mutation models with location catalogs
//! - Describes modifications as edits, grouped into ordered patches
//! - Materializes patches into variants and diffs them against the reference
//! - Loads and validates scenario files
//!
//! # Example
//!
//! ```rust,ignore
//! use graft_core::prelude::*;
//! use rand::SeedableRng;
//!
//! let scenario = Scenario::load("scenario.toml")?;
//! let rules = ModelRule::parse_all(&scenario.software.model_rules)?;
//! let reference = Variant::load_reference(
//!     &scenario.software.path,
//!     &scenario.software.target_files,
//!     &rules,
//!     &ModelOptions::default(),
//! )?;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let kind: EditKind = "LineDeletion".parse()?;
//! let edit = kind.create(&reference, 10, &mut rng)?;
//! let variant = Variant::new(&reference, Patch::from(vec![edit]), DiffMethod::Unified)?;
//! println!("{}", variant.diff());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod diff;
pub mod edit;
pub mod error;
pub mod hash;
pub mod literal;
pub mod location;
pub mod models;
pub mod patch;
pub mod scenario;
pub mod settings;
pub mod variant;

pub use diff::DiffMethod;
pub use edit::{Edit, EditKind, Operation, Payload};
pub use error::{CoreError, CoreResult, EditCreationError, ModelError, ParseError, ScenarioError};
pub use hash::DiffFingerprint;
pub use literal::Value;
pub use location::{Catalog, LocIndex, Location, INTER_PREFIX};
pub use models::{Model, ModelKind, ModelOptions, ModelRule, MutationModel};
pub use patch::Patch;
pub use scenario::Scenario;
pub use settings::Settings;
pub use variant::{Models, Variant};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Graft Core
    pub use crate::{
        DiffFingerprint, DiffMethod, Edit, EditKind, Location, Model, ModelOptions, ModelRule, MutationModel,
        Patch, Scenario, Settings, Variant,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
