//! Turning dispatcher outcomes back into a manifest.

use std::path::Path;

use crate::error::ResampleError;
use crate::manifest::{self, Catalog, ManifestEntry};
use crate::pipeline::ResampleOutcome;

/// Rows written and rows dropped by [`write_outcomes`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub dropped: usize,
}

/// Output rows `<id> <sample_rate> <path>` for every non-failed outcome, in catalog order.
pub fn output_entries(catalog: &Catalog, outcomes: &[ResampleOutcome]) -> Vec<ManifestEntry> {
    catalog
        .entries()
        .iter()
        .zip(outcomes)
        .filter_map(|(entry, outcome)| {
            outcome.resolved().map(|(path, sample_rate)| {
                ManifestEntry::new(entry.id.clone(), vec![sample_rate.to_string()], path)
            })
        })
        .collect()
}

/// Write the resolved outcomes to `path`, dropping failed entries.
pub fn write_outcomes<P: AsRef<Path>>(
    path: P,
    catalog: &Catalog,
    outcomes: &[ResampleOutcome],
) -> Result<WriteSummary, ResampleError> {
    let entries = output_entries(catalog, outcomes);
    manifest::save(path, &entries)?;

    Ok(WriteSummary {
        written: entries.len(),
        dropped: outcomes.len() - entries.len(),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn failed_entries_are_dropped_and_order_is_kept() {
        let catalog = Catalog::new(vec![
            ManifestEntry::new("a", vec!["16000".to_owned()], "/in/a.wav"),
            ManifestEntry::new("b", Vec::new(), "/in/b.flac"),
            ManifestEntry::new("c", Vec::new(), "/in/c.wav"),
        ]);
        let outcomes = vec![
            ResampleOutcome::PassThrough {
                path: PathBuf::from("/in/a.wav"),
                sample_rate: 16_000,
            },
            ResampleOutcome::Failed("b".to_owned()),
            ResampleOutcome::Resampled {
                path: PathBuf::from("/out/0/c.wav"),
                sample_rate: 16_000,
            },
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.scp");

        let summary = write_outcomes(&path, &catalog, &outcomes).unwrap();

        assert_eq!(
            summary,
            WriteSummary {
                written: 2,
                dropped: 1,
            }
        );
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "a 16000 /in/a.wav\nc 16000 /out/0/c.wav\n"
        );
    }
}
