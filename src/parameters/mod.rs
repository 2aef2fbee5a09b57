//! # Parameter System
//!
//! Parameters of an ODMR model are addressed through unique slots rather than
//! free-form names.
//!
//! ## Core Components
//!
//! - [`ParameterIndexer`]: Turns a model's parameter-kind template into unique,
//!   ordered [`Slot`]s and resolves semantic names (`resonance`,
//!   `mean_contrast`, `contrast_1`, ...) to slot indices
//! - [`ConstraintManager`]: Per-slot `(min, max, kind, unit)` constraints,
//!   family-wide updates and the arrays handed to the batched solver
//! - [`Bounds`]: Effective bounds of a constraint, which the CPU solver
//!   projects every step onto
//!
//! ## Example Usage
//!
//! ```rust
//! use odmrfit_rs::config::ConstraintDefaults;
//! use odmrfit_rs::parameters::{ConstraintKind, ConstraintManager, ParameterIndexer, ParameterKind::*};
//!
//! let indexer = ParameterIndexer::from_template(&[Center, Width, Contrast, Contrast, Contrast, Offset]);
//! let mut constraints = ConstraintManager::new(indexer, &ConstraintDefaults::default()).unwrap();
//!
//! // A bare kind name updates every slot of that kind.
//! let updated = constraints.set_constraint("contrast", 0.0, 0.05, "LOWER_UPPER").unwrap();
//! assert_eq!(updated.len(), 3);
//!
//! // Integer indices are accepted as constraint kinds too.
//! constraints.set_constraint("width", 0.0, 0.01, 1).unwrap();
//! assert_eq!(constraints.get("width").unwrap().kind, ConstraintKind::Lower);
//!
//! let bounds = constraints.get_constraints_array(4);
//! assert_eq!(bounds.dim(), (4, 12));
//! ```

pub mod bounds;
pub mod constraints;
pub mod slots;

pub use bounds::{Bounds, BoundsError};
pub use constraints::{Constraint, ConstraintKind, ConstraintManager, IntoConstraintKind};
pub use slots::{ParameterIndexer, ParameterKind, Slot};
