// Copyright 2012 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::cmp;
use std::collections::BTreeMap;

use crate::dataset::SampleRow;

/// Per-IFD medians of one implementation's rows. This is only a console hint; deciding whether
/// the distributions differ is left to whoever reads the dataset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IfdSummary {
    pub sample_size: usize,
    /// `(ifd, median seconds per call)`, ordered by ifd
    pub medians: Vec<(usize, f64)>,
}

impl IfdSummary {
    pub fn from_rows<'a, I>(rows: I) -> IfdSummary
    where
        I: IntoIterator<Item = &'a SampleRow>,
    {
        let mut by_ifd: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        let mut sample_size = 0;
        for row in rows {
            by_ifd.entry(row.ifd).or_default().push(row.time);
            sample_size += 1;
        }

        let medians = by_ifd
            .into_iter()
            .map(|(ifd, mut times)| {
                times.sort_by(|&x, &y| local_cmp(x, y));
                (ifd, percentile_of_sorted(&times, 50f64))
            })
            .collect();

        IfdSummary {
            sample_size,
            medians,
        }
    }

    pub fn median_at(&self, ifd: usize) -> Option<f64> {
        self.medians.iter().find(|&&(i, _)| i == ifd).map(|&(_, m)| m)
    }

    /// Relative change of the median from the lowest to the highest measured ifd
    pub fn spread(&self) -> Option<f64> {
        match (self.medians.first(), self.medians.last()) {
            (Some(&(lo, first)), Some(&(hi, last))) if lo != hi && first > 0f64 => {
                Some((last - first) / first)
            }
            _ => None,
        }
    }

    pub fn fmt(&self) -> String {
        let mut s = format!("n == {}", self.sample_size);
        if let (Some(&(lo, first)), Some(&(hi, last))) = (self.medians.first(), self.medians.last())
        {
            s.push_str(&format!(", median at ifd {} = {:.3}ns", lo, first * 1e9));
            if hi != lo {
                s.push_str(&format!(", median at ifd {} = {:.3}ns", hi, last * 1e9));
            }
        }
        if let Some(spread) = self.spread() {
            s.push_str(&format!(", spread = {:+0.2}%", spread * 100f64));
        }

        s
    }
}

// NaNs are smaller than everything
fn local_cmp(x: f64, y: f64) -> cmp::Ordering {
    use std::cmp::Ordering::{Equal, Greater, Less};
    if y.is_nan() {
        Greater
    } else if x.is_nan() || x < y {
        Less
    } else if x == y {
        Equal
    } else {
        Greater
    }
}

/// Helper function: extract a value representing the `pct` percentile of a sorted sample-set,
/// using linear interpolation. If samples are not sorted, return nonsensical value.
fn percentile_of_sorted(sorted_samples: &[f64], pct: f64) -> f64 {
    assert!(!sorted_samples.is_empty());
    if sorted_samples.len() == 1 {
        return sorted_samples[0];
    }
    assert!((0f64..=100f64).contains(&pct));
    let length = (sorted_samples.len() - 1) as f64;
    let rank = (pct / 100f64) * length;
    let lrank = rank.floor();
    let d = rank - lrank;
    let n = lrank as usize;
    if n + 1 >= sorted_samples.len() {
        return sorted_samples[n];
    }
    let lo = sorted_samples[n];
    let hi = sorted_samples[n + 1];
    lo + (hi - lo) * d
}
