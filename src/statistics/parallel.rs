//! Parallel computation implementations for statistical operations
//!
//! Every output cell is computed independently from its time lane, so the
//! result does not depend on the number of threads.

use super::operations::Statistic;
use log::debug;
use ndarray::{s, Array3};
use rayon::prelude::*;

/// Collapse axis 0 of `data` with a NaN-skipping `statistic`.
///
/// Lanes are accumulated in f64 to avoid precision loss. Output is row-major
/// over `(lat, lon)`.
pub fn parallel_reduce_time(data: &Array3<f32>, statistic: Statistic) -> Vec<Option<f32>> {
    let (_, nlat, nlon) = data.dim();
    let output_size = nlat * nlon;

    debug!(
        "Processing {output_size} cells across {} CPU cores",
        rayon::current_num_threads()
    );

    (0..output_size)
        .into_par_iter()
        .map(|flat_idx| {
            let (i, j) = (flat_idx / nlon, flat_idx % nlon);
            let lane = data.slice(s![.., i, j]);
            lane_statistic(lane.iter().copied(), statistic).map(|v| v as f32)
        })
        .collect()
}

/// Statistic of the finite values of one lane, `None` if there are none.
pub fn lane_statistic(samples: impl Iterator<Item = f32> + Clone, statistic: Statistic) -> Option<f64> {
    let valid = samples.filter(|x| x.is_finite()).map(f64::from);

    let mut count = 0_u32;
    let mut sum = 0.0_f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for x in valid.clone() {
        count += 1;
        sum += x;
        min = min.min(x);
        max = max.max(x);
    }
    if count == 0 {
        return None;
    }

    let n = f64::from(count);
    let mean = sum / n;
    let value = match statistic {
        Statistic::Mean => mean,
        Statistic::Sum => sum,
        Statistic::Min => min,
        Statistic::Max => max,
        Statistic::Variance | Statistic::Std => {
            // Two-pass, population variance
            let variance = valid.map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            if statistic == Statistic::Std {
                variance.sqrt()
            } else {
                variance
            }
        }
    };

    Some(value)
}
