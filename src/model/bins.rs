//! Bin lookup for continuous and categorical features

use serde::Serialize;

use super::FeatureValue;

/// Locate the bin containing `value` given the sorted left edges of all bins.
///
/// Returns `i` such that `bin_starts[i] <= value < bin_starts[i + 1]`,
/// clamped to `0` below the first edge and to the last bin above the last
/// edge. Runs in O(log n).
pub fn locate(bin_starts: &[f64], value: f64) -> usize {
    if bin_starts.is_empty() {
        return 0;
    }

    let mut left = 0;
    let mut right = bin_starts.len() - 1;

    while right - left > 1 {
        let mid = left + (right - left) / 2;

        if value > bin_starts[mid] {
            left = mid;
        } else if value < bin_starts[mid] {
            right = mid;
        } else {
            return mid;
        }
    }

    if value >= bin_starts[right] {
        return right;
    }
    if value < bin_starts[left] {
        return left;
    }

    right - 1
}

/// One axis of bins: continuous left edges or categorical levels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinAxis {
    Continuous(Vec<f64>),
    Categorical(Vec<String>),
}

impl BinAxis {
    /// Number of bins on this axis
    pub fn len(&self) -> usize {
        match self {
            BinAxis::Continuous(starts) => starts.len(),
            BinAxis::Categorical(levels) => levels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the bin of a value. `None` for unseen categorical levels or a
    /// value whose kind does not match the axis.
    pub fn locate(&self, value: &FeatureValue) -> Option<usize> {
        match (self, value) {
            (BinAxis::Continuous(starts), FeatureValue::Number(x)) => {
                if starts.is_empty() {
                    None
                } else {
                    Some(locate(starts, *x))
                }
            }
            (BinAxis::Categorical(levels), FeatureValue::Level(level)) => {
                levels.iter().position(|l| l == level)
            }
            _ => None,
        }
    }

    /// Human-readable range of a bin, e.g. `[3000, 5000)` or `[9000, inf)`
    pub fn describe_bin(&self, bin: usize) -> String {
        match self {
            BinAxis::Continuous(starts) => match (starts.get(bin), starts.get(bin + 1)) {
                (Some(lo), Some(hi)) => format!("[{}, {})", lo, hi),
                (Some(lo), None) => format!("[{}, inf)", lo),
                _ => String::new(),
            },
            BinAxis::Categorical(levels) => levels.get(bin).cloned().unwrap_or_default(),
        }
    }
}
