//! # Aggregation
//!
//! Per-dimension means over a population of score vectors.
//!
//! Zero values are treated as "no score" and left out of both the sum and
//! the count. A dimension with no non-zero values averages to `0.0`. Stored
//! scores are never zero, so through [`Aggregator::average`] the guard only
//! fires for an empty population; [`Aggregator::average_rows`] accepts raw
//! rows where zeros can occur.

use crate::dimension::{DIMENSION_COUNT, Dimension};
use crate::radar::RadarAxis;
use crate::score::ScoreVector;
use serde::{Deserialize, Serialize};

/// Mean score per dimension over some population. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateVector {
    means: [f64; DIMENSION_COUNT],
    population: usize,
}

impl AggregateVector {
    /// The aggregate of nothing: every mean is `0.0`.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            means: [0.0; DIMENSION_COUNT],
            population: 0,
        }
    }

    #[must_use]
    pub fn mean(&self, dimension: Dimension) -> f64 {
        self.means[dimension.index()]
    }

    #[must_use]
    pub fn means(&self) -> &[f64; DIMENSION_COUNT] {
        &self.means
    }

    /// Number of rows that went into the aggregate.
    #[must_use]
    pub fn population(&self) -> usize {
        self.population
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.population == 0
    }

    /// `(dimension, mean)` in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        Dimension::ALL.into_iter().zip(self.means.iter().copied())
    }

    /// One radar axis per dimension, labelled with the display label.
    #[must_use]
    pub fn to_axes(&self) -> Vec<RadarAxis> {
        self.iter()
            .map(|(dimension, mean)| RadarAxis::new(dimension.label(), mean))
            .collect()
    }
}

impl Default for AggregateVector {
    fn default() -> Self {
        Self::empty()
    }
}

/// Computes [`AggregateVector`]s. Stateless.
pub struct Aggregator;

impl Aggregator {
    /// Average a collection of score vectors.
    pub fn average<'a, I>(vectors: I) -> AggregateVector
    where
        I: IntoIterator<Item = &'a ScoreVector>,
    {
        Self::average_rows(vectors.into_iter().map(ScoreVector::as_row))
    }

    /// Average raw score rows, ignoring zero entries per dimension.
    pub fn average_rows<I>(rows: I) -> AggregateVector
    where
        I: IntoIterator<Item = [u8; DIMENSION_COUNT]>,
    {
        // Integer accumulation keeps the result independent of row order.
        let mut sums = [0_u64; DIMENSION_COUNT];
        let mut counts = [0_u64; DIMENSION_COUNT];
        let mut population = 0_usize;

        for row in rows {
            population = population.saturating_add(1);
            for (i, value) in row.iter().enumerate() {
                if *value != 0 {
                    sums[i] = sums[i].saturating_add(u64::from(*value));
                    counts[i] = counts[i].saturating_add(1);
                }
            }
        }

        let mut means = [0.0; DIMENSION_COUNT];
        for i in 0..DIMENSION_COUNT {
            if counts[i] != 0 {
                means[i] = sums[i] as f64 / counts[i] as f64;
            }
        }

        tracing::trace!(population, "aggregated score rows");
        AggregateVector { means, population }
    }
}

// =============================================================================
// TESTS
// =============================================================================
