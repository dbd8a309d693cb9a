//! Index-derived shard directories.
//!
//! Entry `i` of a catalog lands in directory `i / max_items_per_dir`, rendered
//! as fixed-width lowercase hexadecimal. The width is derived once from the
//! catalog size so every bucket of the run gets a distinct, equally wide name.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Extension of every artifact written by the pipeline.
pub const OUTPUT_EXTENSION: &str = "wav";

/// Shard geometry for a single run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardLayout {
    max_items_per_dir: NonZeroUsize,
    digit_width: usize,
}

impl ShardLayout {
    /// Layout for a catalog of `total` entries.
    pub fn for_catalog(total: usize, max_items_per_dir: NonZeroUsize) -> Self {
        Self {
            max_items_per_dir,
            digit_width: digit_width(total, max_items_per_dir),
        }
    }

    /// Name of the shard directory holding entry `index`.
    pub fn shard_name(&self, index: usize) -> String {
        assign(index, self.max_items_per_dir, self.digit_width)
    }

    /// `output_dir/<shard>/<id>.wav`. The id is used verbatim.
    pub fn output_path(&self, output_dir: &Path, index: usize, id: &str) -> PathBuf {
        let mut path = output_dir.join(self.shard_name(index));
        path.push(format!("{id}.{OUTPUT_EXTENSION}"));
        path
    }
}

/// Render the shard bucket of `index` as zero-padded lowercase hex.
pub fn assign(index: usize, max_items_per_dir: NonZeroUsize, digit_width: usize) -> String {
    let bucket = index / max_items_per_dir.get();
    format!("{bucket:0digit_width$x}")
}

/// Smallest `d >= 1` such that `16^d` covers every bucket of a `total`-entry catalog.
pub fn digit_width(total: usize, max_items_per_dir: NonZeroUsize) -> usize {
    let per_dir = max_items_per_dir.get();
    let buckets = (total / per_dir + usize::from(total % per_dir != 0)) as u128;

    let mut width = 1;
    let mut capacity: u128 = 16;
    while capacity < buckets {
        width += 1;
        capacity *= 16;
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    #[test]
    fn digit_width_is_clamped_to_one() {
        assert_eq!(digit_width(0, nz(1000)), 1);
        assert_eq!(digit_width(2, nz(1000)), 1);
        assert_eq!(digit_width(1000, nz(1000)), 1);
    }

    #[test]
    fn digit_width_grows_at_powers_of_sixteen() {
        assert_eq!(digit_width(16, nz(1)), 1);
        assert_eq!(digit_width(17, nz(1)), 2);
        assert_eq!(digit_width(256, nz(1)), 2);
        assert_eq!(digit_width(257, nz(1)), 3);
        // 16 full buckets of 5000 fit one digit; the 17th bucket needs two.
        assert_eq!(digit_width(80_000, nz(5000)), 1);
        assert_eq!(digit_width(80_001, nz(5000)), 2);
    }

    #[test]
    fn assign_pads_lowercase_hex() {
        assert_eq!(assign(0, nz(10), 2), "00");
        assert_eq!(assign(109, nz(10), 2), "0a");
        assert_eq!(assign(2559, nz(10), 2), "ff");
        assert_eq!(assign(2560, nz(10), 3), "100");
    }

    #[test]
    fn same_shard_iff_same_bucket() {
        let per_dir = nz(7);
        let width = digit_width(100, per_dir);
        for i in 0..100 {
            for j in 0..100 {
                assert_eq!(
                    assign(i, per_dir, width) == assign(j, per_dir, width),
                    i / 7 == j / 7,
                    "indices {i} and {j}"
                );
            }
        }
    }

    #[test]
    fn every_shard_holds_at_most_max_items() {
        let layout = ShardLayout::for_catalog(1_000, nz(64));
        let mut counts = std::collections::HashMap::new();
        for i in 0..1_000 {
            *counts.entry(layout.shard_name(i)).or_insert(0usize) += 1;
        }
        assert!(counts.values().all(|&count| count <= 64));
        assert_eq!(counts.len(), 16);
        assert!(counts.keys().all(|name| name.len() == 1));
    }

    #[test]
    fn output_path_uses_shard_and_id() {
        let layout = ShardLayout::for_catalog(2, nz(1000));
        let path = layout.output_path(Path::new("/out"), 1, "b");
        assert_eq!(path, PathBuf::from("/out/0/b.wav"));
    }
}
