use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CellRef, Range};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("merged range {0} covers a single cell")]
    SingleCell(Range),
    #[error("merged range {new} overlaps existing merged range {existing}")]
    Overlap { new: Range, existing: Range },
}

/// Set of merged-cell regions owned by one worksheet.
///
/// Regions never overlap one another; [`MergedRegions::add`] enforces this on insert and
/// [`MergedRegions::validate`] re-checks collections that were built another way
/// (e.g. deserialized).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergedRegions {
    regions: Vec<Range>,
}

impl MergedRegions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, range: Range) -> Result<(), MergeError> {
        if range.is_single_cell() {
            return Err(MergeError::SingleCell(range));
        }
        if let Some(existing) = self.regions.iter().find(|r| r.intersects(&range)) {
            return Err(MergeError::Overlap {
                new: range,
                existing: *existing,
            });
        }
        self.regions.push(range);
        Ok(())
    }

    /// Remove a region by its exact bounds. Returns true if it was present.
    pub fn remove(&mut self, range: &Range) -> bool {
        let before = self.regions.len();
        self.regions.retain(|r| r != range);
        self.regions.len() != before
    }

    /// The merged region covering `cell`, if any.
    pub fn containing(&self, cell: CellRef) -> Option<&Range> {
        self.regions.iter().find(|r| r.contains(cell))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn validate(&self) -> Result<(), MergeError> {
        for (idx, range) in self.regions.iter().enumerate() {
            if range.is_single_cell() {
                return Err(MergeError::SingleCell(*range));
            }
            if let Some(existing) = self.regions[..idx].iter().find(|r| r.intersects(range)) {
                return Err(MergeError::Overlap {
                    new: *range,
                    existing: *existing,
                });
            }
        }
        Ok(())
    }
}
