//! Per-slot bound constraints.
//!
//! [`ConstraintManager`] stores one [`Constraint`] per unique slot, seeded from
//! the configured per-kind defaults, and produces the per-row bound arrays and
//! per-slot kind codes the batched solver consumes.

use crate::config::ConstraintDefaults;
use crate::error::{OdmrFitError, Result};
use crate::parameters::bounds::Bounds;
use crate::parameters::slots::{ParameterIndexer, ParameterKind};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bound regime applied to a slot during optimization.
///
/// The discriminants are the solver's integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    Free = 0,
    Lower = 1,
    Upper = 2,
    LowerUpper = 3,
}

impl ConstraintKind {
    pub const ALL: [ConstraintKind; 4] = [
        ConstraintKind::Free,
        ConstraintKind::Lower,
        ConstraintKind::Upper,
        ConstraintKind::LowerUpper,
    ];

    /// Symbolic name.
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::Free => "FREE",
            ConstraintKind::Lower => "LOWER",
            ConstraintKind::Upper => "UPPER",
            ConstraintKind::LowerUpper => "LOWER_UPPER",
        }
    }

    /// Integer code passed to the solver.
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Resolve a solver code.
    pub fn from_code(code: i64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| i64::from(kind.code()) == code)
            .ok_or_else(|| {
                OdmrFitError::Configuration(format!(
                    "Unknown constraint kind index {}, choose from 0..={} ({})",
                    code,
                    Self::ALL.len() - 1,
                    Self::names()
                ))
            })
    }

    fn names() -> String {
        Self::ALL.iter().map(|k| k.name()).collect::<Vec<_>>().join(", ")
    }
}

impl FromStr for ConstraintKind {
    type Err = OdmrFitError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                OdmrFitError::Configuration(format!(
                    "Unknown constraint kind '{}', choose from {}",
                    s,
                    Self::names()
                ))
            })
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything that names a constraint kind: the enum itself, its symbolic
/// name, or its integer index.
pub trait IntoConstraintKind {
    fn into_constraint_kind(self) -> Result<ConstraintKind>;
}

impl IntoConstraintKind for ConstraintKind {
    fn into_constraint_kind(self) -> Result<ConstraintKind> {
        Ok(self)
    }
}

impl IntoConstraintKind for &str {
    fn into_constraint_kind(self) -> Result<ConstraintKind> {
        self.parse()
    }
}

impl IntoConstraintKind for i32 {
    fn into_constraint_kind(self) -> Result<ConstraintKind> {
        ConstraintKind::from_code(i64::from(self))
    }
}

impl IntoConstraintKind for usize {
    fn into_constraint_kind(self) -> Result<ConstraintKind> {
        i64::try_from(self)
            .map_err(|_| OdmrFitError::Configuration(format!("Unknown constraint kind index {}", self)))
            .and_then(ConstraintKind::from_code)
    }
}

/// Bounds, regime and unit of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Constraint {
    pub min: f64,
    pub max: f64,
    pub kind: ConstraintKind,
    pub unit: &'static str,
}

impl Constraint {
    /// Effective solver bounds of this constraint.
    pub fn bounds(&self) -> Result<Bounds> {
        Ok(Bounds::for_kind(self.kind, self.min, self.max)?)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}] {} ({})", self.min, self.max, self.kind, self.unit)
    }
}

/// Stores and serves the constraints of every unique slot of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintManager {
    indexer: ParameterIndexer,
    constraints: Vec<Constraint>,
}

impl ConstraintManager {
    /// Seed every slot with the default bounds of its kind.
    pub fn new(indexer: ParameterIndexer, defaults: &ConstraintDefaults) -> Result<Self> {
        let constraints = indexer
            .slots()
            .iter()
            .map(|slot| {
                let default = defaults.for_kind(slot.kind);
                let constraint = Constraint {
                    min: default.min,
                    max: default.max,
                    kind: default.kind,
                    unit: slot.kind.unit(),
                };
                constraint.bounds().map(|_| constraint)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            indexer,
            constraints,
        })
    }

    pub fn indexer(&self) -> &ParameterIndexer {
        &self.indexer
    }

    /// Constraints in slot order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Constraint of a unique slot name.
    pub fn get(&self, slot_name: &str) -> Option<&Constraint> {
        self.indexer
            .slots()
            .iter()
            .position(|slot| slot.name() == slot_name)
            .map(|i| &self.constraints[i])
    }

    /// Set the constraint of a slot, or of every slot of a kind.
    ///
    /// `name` is either a unique slot name (`contrast_1`) or a bare kind name
    /// (`contrast`), which fans out to every slot of that kind. Returns the
    /// names of the updated slots. Nothing changes when validation fails.
    pub fn set_constraint<K: IntoConstraintKind>(
        &mut self,
        name: &str,
        min: f64,
        max: f64,
        kind: K,
    ) -> Result<Vec<String>> {
        let kind = kind.into_constraint_kind()?;
        let targets = match ParameterKind::from_name(name) {
            Some(family) => self.indexer.indices_of_kind(family),
            None => self
                .indexer
                .slots()
                .iter()
                .position(|slot| slot.name() == name)
                .map(|i| vec![i])
                .unwrap_or_default(),
        };

        if targets.is_empty() {
            return Err(OdmrFitError::ParameterLookup(format!(
                "Cannot constrain unknown parameter '{}', choose from {:?}",
                name,
                self.indexer.slot_names()
            )));
        }

        Bounds::for_kind(kind, min, max)?;

        let mut updated = Vec::with_capacity(targets.len());
        for i in targets {
            let constraint = &mut self.constraints[i];
            constraint.min = min;
            constraint.max = max;
            constraint.kind = kind;
            updated.push(self.indexer.slots()[i].name());
        }

        Ok(updated)
    }

    /// Mark every slot `FREE`, keeping its stored bounds.
    pub fn set_free(&mut self) {
        for constraint in &mut self.constraints {
            constraint.kind = ConstraintKind::Free;
        }
    }

    /// Copy constraints for slot names that also exist in `other`.
    pub fn inherit_from(&mut self, other: &ConstraintManager) {
        for (slot, constraint) in self.indexer.slots().iter().zip(self.constraints.iter_mut()) {
            if let Some(previous) = other.get(&slot.name()) {
                *constraint = *previous;
            }
        }
    }

    /// `(n_pixels, 2 * slots)` array of `(min, max)` pairs, identical per row.
    pub fn get_constraints_array(&self, n_pixels: usize) -> Array2<f32> {
        let row: Vec<f32> = self
            .constraints
            .iter()
            .flat_map(|c| [c.min as f32, c.max as f32])
            .collect();
        let width = row.len();

        Array2::from_shape_fn((n_pixels, width), |(_, j)| row[j])
    }

    /// Integer-encoded constraint kind per slot, in slot order.
    pub fn get_constraint_types(&self) -> Array1<i32> {
        self.constraints.iter().map(|c| c.kind.code()).collect()
    }
}
