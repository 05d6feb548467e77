//! Nodal averaging of element-nodal stress contributions.
//!
//! Every element writes its extrapolated stress at each of its corner nodes,
//! so a node shared by `k` elements receives `k` contributions. The averaged
//! value is the arithmetic mean of S11, S22 and S33 over those contributions.
//!
//! Accumulation is a single pass into a dense `label - 1` indexed arena.
//! Contributions are split into at most [`MAX_PARTIALS`] chunks, each reduced
//! in parallel into its own arena; the partial sums are then merged in chunk
//! order. Chunk boundaries depend only on the input length, so repeated runs
//! give bit-identical averages and peak memory stays at `MAX_PARTIALS` arenas.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Smallest chunk worth a separate arena
const MIN_CHUNK: usize = 16_384;

/// Upper bound on the partial arenas alive at once
pub const MAX_PARTIALS: usize = 8;

fn chunk_size(contributions: usize) -> usize {
    contributions.div_ceil(MAX_PARTIALS).max(MIN_CHUNK)
}

/// One element's stress value extrapolated to one of its nodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressContribution {
    /// Node label (1-based)
    pub node: u32,
    pub s11: f64,
    pub s22: f64,
    pub s33: f64,
}

impl StressContribution {
    pub fn new(node: u32, s11: f64, s22: f64, s33: f64) -> Self {
        Self {
            node,
            s11,
            s22,
            s33,
        }
    }
}

/// What a node without any stress contribution gets as its average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyNodePolicy {
    /// Report `0.0` for all components.
    #[default]
    Zero,
    /// Report `NaN` for all components.
    Nan,
}

impl EmptyNodePolicy {
    fn fill(self) -> f64 {
        match self {
            EmptyNodePolicy::Zero => 0.0,
            EmptyNodePolicy::Nan => f64::NAN,
        }
    }
}

/// Averaged S11/S22/S33 per node, row `i` holding node label `i + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct AveragedStress {
    values: Vec<[f64; 3]>,
    counts: Vec<u32>,
}

impl AveragedStress {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, label: u32) -> Option<[f64; 3]> {
        let index = (label as usize).checked_sub(1)?;
        self.values.get(index).copied()
    }

    /// Number of contributions that went into a node's average.
    pub fn count(&self, label: u32) -> Option<u32> {
        let index = (label as usize).checked_sub(1)?;
        self.counts.get(index).copied()
    }

    pub fn rows(&self) -> &[[f64; 3]] {
        &self.values
    }

    /// One component (0 = S11, 1 = S22, 2 = S33) for every node in row order.
    pub fn component(&self, component: usize) -> Vec<f64> {
        self.values.iter().map(|row| row[component]).collect()
    }

    /// Number of nodes that received no contribution.
    pub fn empty_nodes(&self) -> usize {
        self.counts.iter().filter(|&&c| c == 0).count()
    }
}

#[derive(Debug, Clone)]
struct Accumulator {
    sums: Vec<[f64; 3]>,
    counts: Vec<u32>,
}

impl Accumulator {
    fn new(node_count: usize) -> Self {
        Self {
            sums: vec![[0.0; 3]; node_count],
            counts: vec![0; node_count],
        }
    }

    fn add(&mut self, contribution: &StressContribution) -> Result<()> {
        let index = (contribution.node as usize)
            .checked_sub(1)
            .filter(|&i| i < self.sums.len())
            .ok_or_else(|| ModelError::unknown_node(contribution.node, "stress contribution"))?;

        let sum = &mut self.sums[index];
        sum[0] += contribution.s11;
        sum[1] += contribution.s22;
        sum[2] += contribution.s33;
        self.counts[index] += 1;
        Ok(())
    }

    fn merge(&mut self, other: &Accumulator) {
        for (sum, part) in self.sums.iter_mut().zip(&other.sums) {
            sum[0] += part[0];
            sum[1] += part[1];
            sum[2] += part[2];
        }
        for (count, part) in self.counts.iter_mut().zip(&other.counts) {
            *count += part;
        }
    }
}

/// Average element-nodal stress contributions per node.
///
/// `node_count` is the size of the node table; every contribution must name
/// a label in `1..=node_count`. Nodes with no contribution are filled per
/// `policy`.
pub fn average_stress(
    node_count: usize,
    contributions: &[StressContribution],
    policy: EmptyNodePolicy,
) -> Result<AveragedStress> {
    let mut partials = contributions
        .par_chunks(chunk_size(contributions.len()))
        .map(|chunk| {
            let mut acc = Accumulator::new(node_count);
            for contribution in chunk {
                acc.add(contribution)?;
            }
            Ok(acc)
        })
        .collect::<Result<Vec<_>>>()?
        .into_iter();

    let mut total = partials
        .next()
        .unwrap_or_else(|| Accumulator::new(node_count));
    for partial in partials {
        total.merge(&partial);
    }

    let fill = policy.fill();
    let values = total
        .sums
        .iter()
        .zip(&total.counts)
        .map(|(sum, &count)| {
            if count == 0 {
                [fill; 3]
            } else {
                let n = f64::from(count);
                [sum[0] / n, sum[1] / n, sum[2] / n]
            }
        })
        .collect();

    let averaged = AveragedStress {
        values,
        counts: total.counts,
    };

    let empty = averaged.empty_nodes();
    if empty > 0 {
        tracing::warn!(
            nodes = empty,
            ?policy,
            "nodes without stress contributions"
        );
    }
    tracing::debug!(
        nodes = node_count,
        contributions = contributions.len(),
        "averaged nodal stresses"
    );

    Ok(averaged)
}
