//! Unique parameter slots for multiplet models.
//!
//! A model template lists parameter kinds in solver order and may repeat a
//! kind (the 14N triplet carries three contrasts). [`ParameterIndexer`] turns
//! the template into an ordered list of [`Slot`]s, each a `(kind, peak_index)`
//! pair, so lookups never need to parse suffixed names.

use crate::error::{OdmrFitError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a model parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    /// Resonance center frequency.
    Center,
    /// Line width of every peak in the multiplet.
    Width,
    /// Depth of one resonance dip.
    Contrast,
    /// Baseline offset from the normalized level of one.
    Offset,
}

impl ParameterKind {
    /// All kinds, in the order a template lists them.
    pub const ALL: [ParameterKind; 4] = [
        ParameterKind::Center,
        ParameterKind::Width,
        ParameterKind::Contrast,
        ParameterKind::Offset,
    ];

    /// Bare name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            ParameterKind::Center => "center",
            ParameterKind::Width => "width",
            ParameterKind::Contrast => "contrast",
            ParameterKind::Offset => "offset",
        }
    }

    /// Physical unit of values of this kind.
    pub fn unit(&self) -> &'static str {
        match self {
            ParameterKind::Center | ParameterKind::Width => "GHz",
            ParameterKind::Contrast | ParameterKind::Offset => "a.u.",
        }
    }

    /// Resolve a bare kind name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A uniquely addressable parameter position.
///
/// `index` is `Some(n)` only when the kind repeats in the template, where `n`
/// counts earlier occurrences of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub kind: ParameterKind,
    pub index: Option<usize>,
}

impl Slot {
    /// Unique slot name (`contrast_1`) or the bare kind name (`center`).
    pub fn name(&self) -> String {
        match self.index {
            Some(n) => format!("{}_{}", self.kind.name(), n),
            None => self.kind.name().to_string(),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Maps a model template onto unique, ordered slots.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterIndexer {
    slots: Vec<Slot>,
}

impl ParameterIndexer {
    /// Build the slot list for a template, preserving template order.
    ///
    /// # Examples
    ///
    /// ```
    /// use odmrfit_rs::parameters::{ParameterIndexer, ParameterKind::*};
    ///
    /// let indexer = ParameterIndexer::from_template(&[Center, Width, Contrast, Contrast, Offset]);
    /// assert_eq!(indexer.slot_names(), ["center", "width", "contrast_0", "contrast_1", "offset"]);
    /// ```
    pub fn from_template(template: &[ParameterKind]) -> Self {
        let slots = template
            .iter()
            .enumerate()
            .map(|(position, &kind)| {
                let total = template.iter().filter(|&&k| k == kind).count();
                let index = if total > 1 {
                    Some(template[..position].iter().filter(|&&k| k == kind).count())
                } else {
                    None
                };
                Slot { kind, index }
            })
            .collect();

        Self { slots }
    }

    /// Number of slots (equals the template length).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Unique slot names in slot order.
    pub fn slot_names(&self) -> Vec<String> {
        self.slots.iter().map(Slot::name).collect()
    }

    /// Kind stored at `index`.
    pub fn kind_of(&self, index: usize) -> Option<ParameterKind> {
        self.slots.get(index).map(|slot| slot.kind)
    }

    /// Indices of every slot of `kind`, in slot order.
    pub fn indices_of_kind(&self, kind: ParameterKind) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.kind == kind)
            .map(|(i, _)| i)
            .collect()
    }

    /// Resolve a semantic name to slot indices.
    ///
    /// Accepts unique slot names, bare kind names (every slot of that kind),
    /// and the aliases `resonance` (center) and `mean_contrast` (all
    /// contrast slots).
    pub fn lookup(&self, name: &str) -> Result<Vec<usize>> {
        let name = match name {
            "resonance" => "center",
            "mean_contrast" => "contrast",
            other => other,
        };

        if let Some(kind) = ParameterKind::from_name(name) {
            let indices = self.indices_of_kind(kind);
            if !indices.is_empty() {
                return Ok(indices);
            }
        }

        self.slots
            .iter()
            .position(|slot| slot.name() == name)
            .map(|i| vec![i])
            .ok_or_else(|| {
                OdmrFitError::ParameterLookup(format!(
                    "Unknown parameter '{}', choose from {:?} or the aliases resonance, mean_contrast",
                    name,
                    self.slot_names()
                ))
            })
    }
}
