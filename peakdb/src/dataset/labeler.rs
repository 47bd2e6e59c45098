//! Rasterization of overlapping intervals and reduction to labels.

use std::collections::HashMap;

use ndarray::{s, Array1, Array2, ArrayView2, Axis};

use crate::error::{Error, Result};
use crate::store::IntervalHit;

/// What the annotation intervals mean for the label array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    /// Presence/absence over the whole interval (BED-style regions)
    Regions,
    /// Point features: only the summit position is set (narrowPeak)
    Summits,
    /// Quantitative per-position values (bedGraph)
    Values,
}

/// How the rasterized `(conditions, window)` array reduces to a label. The
/// `Inner*` variants first restrict to a centered sub-window of the given
/// half-width, then apply the same reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate {
    /// At least one position set
    Any,
    /// Every position set
    All,
    /// The set fraction meets the threshold
    Fraction { threshold: f64 },
    InnerAny { half_width: usize },
    InnerAll { half_width: usize },
    InnerFraction { half_width: usize, threshold: f64 },
    /// No reduction: the rasterized array is the label
    None,
}

impl LabelKind {
    pub fn from_name(name: &str) -> Result<LabelKind> {
        match name {
            "regions" => Ok(LabelKind::Regions),
            "summits" => Ok(LabelKind::Summits),
            "values" => Ok(LabelKind::Values),
            _ => Err(Error::Config(format!("unknown label kind '{}'", name))),
        }
    }
}

impl Aggregate {
    /// Build an aggregation from the flat configuration surface: a name plus
    /// the optional parameters some names require. The combination is
    /// validated here, once; the resulting variant carries its parameters.
    pub fn from_config(
        name: &str,
        inner_half_width: Option<usize>,
        fraction_threshold: Option<f64>,
    ) -> Result<Aggregate> {
        let half_width = || {
            inner_half_width.ok_or_else(|| {
                Error::Config(format!("aggregation '{}' needs an inner half-width", name))
            })
        };
        let threshold = || {
            fraction_threshold.ok_or_else(|| {
                Error::Config(format!("aggregation '{}' needs a fraction threshold", name))
            })
        };

        Ok(match name {
            "any" => Aggregate::Any,
            "all" => Aggregate::All,
            "fraction" => Aggregate::Fraction {
                threshold: threshold()?,
            },
            "inner_any" => Aggregate::InnerAny {
                half_width: half_width()?,
            },
            "inner_all" => Aggregate::InnerAll {
                half_width: half_width()?,
            },
            "inner_fraction" => Aggregate::InnerFraction {
                half_width: half_width()?,
                threshold: threshold()?,
            },
            "none" => Aggregate::None,
            _ => return Err(Error::Config(format!("unknown aggregation '{}'", name))),
        })
    }
}

/// A computed label: one entry per condition, or the raw per-position array
/// when no reduction is configured.
#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    Mask(Array1<bool>),
    Dense(Array2<f32>),
}

/// Turns the intervals overlapping a window into a fixed-shape label.
pub struct Labeler {
    window: usize,
    kind: LabelKind,
    aggregate: Aggregate,
    /// Condition id -> row in the rasterized array, ids ascending.
    rows: HashMap<i64, usize>,
}

impl Labeler {
    pub(crate) fn new(
        window: usize,
        kind: LabelKind,
        aggregate: Aggregate,
        condition_ids: &[i64],
    ) -> Labeler {
        let mut ids = condition_ids.to_vec();
        ids.sort_unstable();
        let rows = ids.into_iter().enumerate().map(|(row, id)| (id, row)).collect();
        Labeler {
            window,
            kind,
            aggregate,
            rows,
        }
    }

    /// Number of rows in the rasterized array; a store without conditions
    /// still labels with a single all-clear row.
    pub fn conditions(&self) -> usize {
        self.rows.len().max(1)
    }

    /// Label the window `[abs_start, abs_start + window)` from the interval
    /// hits returned by the spatial index. Hits on other chromosomes (the
    /// inclusive overlap query can brush the neighbouring chromosome at the
    /// coordinate-line seam) are ignored.
    pub(crate) fn label(
        &self,
        hits: &[IntervalHit],
        chromosome_id: i64,
        abs_start: u64,
    ) -> Label {
        if self.kind == LabelKind::Values {
            return Label::Dense(self.rasterize_values(hits, chromosome_id, abs_start));
        }

        let positions = self.rasterize_mask(hits, chromosome_id, abs_start);
        match self.aggregate {
            Aggregate::None => {
                Label::Dense(positions.mapv(|set| if set { 1.0 } else { 0.0 }))
            }
            _ => Label::Mask(self.reduce(&positions)),
        }
    }

    /// Clip `[start, end)` against the window and return local indices.
    /// Empty when the interval only touches the window boundary.
    fn clip(&self, start: u64, end: u64, abs_start: u64) -> Option<(usize, usize)> {
        let from = start.saturating_sub(abs_start) as usize;
        let to = (end.min(abs_start + self.window as u64)).saturating_sub(abs_start) as usize;
        (from < to).then(|| (from, to))
    }

    fn rasterize_mask(
        &self,
        hits: &[IntervalHit],
        chromosome_id: i64,
        abs_start: u64,
    ) -> Array2<bool> {
        let mut positions = Array2::from_elem((self.conditions(), self.window), false);

        for hit in hits.iter().filter(|hit| hit.chromosome_id == chromosome_id) {
            let row = match self.rows.get(&hit.condition_id) {
                Some(row) => *row,
                None => continue,
            };
            match self.kind {
                LabelKind::Regions => {
                    if let Some((from, to)) = self.clip(hit.start, hit.end, abs_start) {
                        positions.slice_mut(s![row, from..to]).fill(true);
                    }
                }
                LabelKind::Summits => {
                    if let Some(summit) = hit.summit {
                        let at = hit.start + summit;
                        if at >= abs_start && at < abs_start + self.window as u64 {
                            positions[[row, (at - abs_start) as usize]] = true;
                        }
                    }
                }
                LabelKind::Values => unreachable!("handled in label()"),
            }
        }

        positions
    }

    fn rasterize_values(
        &self,
        hits: &[IntervalHit],
        chromosome_id: i64,
        abs_start: u64,
    ) -> Array2<f32> {
        let mut positions = Array2::zeros((self.conditions(), self.window));

        for hit in hits.iter().filter(|hit| hit.chromosome_id == chromosome_id) {
            let row = match self.rows.get(&hit.condition_id) {
                Some(row) => *row,
                None => continue,
            };
            let value = match hit.value {
                Some(value) => value as f32,
                None => continue,
            };
            if let Some((from, to)) = self.clip(hit.start, hit.end, abs_start) {
                // overlapping same-condition intervals: last write wins
                positions.slice_mut(s![row, from..to]).fill(value);
            }
        }

        positions
    }

    /// Reduce a rasterized array to one boolean per condition.
    fn reduce(&self, positions: &Array2<bool>) -> Array1<bool> {
        let view = match self.aggregate {
            Aggregate::InnerAny { half_width }
            | Aggregate::InnerAll { half_width }
            | Aggregate::InnerFraction { half_width, .. } => self.inner(positions, half_width),
            _ => positions.view(),
        };

        match self.aggregate {
            Aggregate::Any | Aggregate::InnerAny { .. } => {
                view.map_axis(Axis(1), |row| row.iter().any(|set| *set))
            }
            Aggregate::All | Aggregate::InnerAll { .. } => {
                view.map_axis(Axis(1), |row| row.iter().all(|set| *set))
            }
            Aggregate::Fraction { threshold }
            | Aggregate::InnerFraction { threshold, .. } => view.map_axis(Axis(1), |row| {
                let set = row.iter().filter(|set| **set).count();
                set as f64 / row.len() as f64 >= threshold
            }),
            Aggregate::None => unreachable!("handled in label()"),
        }
    }

    /// The centered sub-window `[mid - half, mid + half]`, clamped.
    fn inner<'a>(&self, positions: &'a Array2<bool>, half_width: usize) -> ArrayView2<'a, bool> {
        let mid = self.window / 2;
        let from = mid.saturating_sub(half_width);
        let to = (mid + half_width + 1).min(self.window);
        positions.slice(s![.., from..to])
    }
}
