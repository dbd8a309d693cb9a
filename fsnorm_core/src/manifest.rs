//! Line-oriented `<id> [<field>]* <path>` manifests.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::warn;
use tempfile::NamedTempFile;

use crate::error::ResampleError;

/// A single manifest row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Opaque, whitespace-free identifier, unique within a manifest.
    pub id: String,
    /// Columns between the identifier and the path, in order.
    pub extra_fields: Vec<String>,
    /// Location of the audio file.
    pub path: PathBuf,
}

impl ManifestEntry {
    pub fn new<I: Into<String>, P: Into<PathBuf>>(
        id: I,
        extra_fields: Vec<String>,
        path: P,
    ) -> Self {
        Self {
            id: id.into(),
            extra_fields,
            path: path.into(),
        }
    }

    /// Parse one manifest line. Returns `None` for lines with fewer than two tokens.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 2 {
            return None;
        }

        let path = tokens.pop()?;
        let id = tokens.remove(0);
        Some(Self::new(
            id,
            tokens.into_iter().map(str::to_owned).collect(),
            path,
        ))
    }

    fn write_line<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{}", self.id)?;
        for field in &self.extra_fields {
            write!(writer, " {field}")?;
        }
        writeln!(writer, " {}", self.path.to_string_lossy())
    }
}

/// A line that could not be turned into a [`ManifestEntry`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedLine {
    /// One-based line number in the source.
    pub line_number: usize,
    pub content: String,
}

/// An ordered, immutable sequence of manifest entries.
///
/// The position of an entry is its index for shard assignment, and the order
/// in which results are written back out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<ManifestEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of reading a manifest: the usable entries and the lines that were skipped.
#[derive(Clone, Debug, Default)]
pub struct LoadedManifest {
    pub catalog: Catalog,
    pub malformed: Vec<MalformedLine>,
}

/// Parse manifest text read from `reader`.
///
/// Blank lines are ignored. Lines with a single token or invalid UTF-8 are
/// collected in [`LoadedManifest::malformed`] and logged, but never abort the
/// load.
pub fn read<R: BufRead>(reader: R) -> Result<LoadedManifest, ResampleError> {
    let mut entries = Vec::new();
    let mut malformed = Vec::new();

    for (index, raw) in reader.split(b'\n').enumerate() {
        let mut raw = raw?;
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        let line_number = index + 1;

        let parsed = match String::from_utf8(raw) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => ManifestEntry::parse(&line).ok_or(line),
            Err(err) => Err(String::from_utf8_lossy(err.as_bytes()).into_owned()),
        };

        match parsed {
            Ok(entry) => entries.push(entry),
            Err(content) => {
                warn!("skipping malformed manifest line {line_number}: '{content}'");
                malformed.push(MalformedLine {
                    line_number,
                    content,
                });
            }
        }
    }

    Ok(LoadedManifest {
        catalog: Catalog::new(entries),
        malformed,
    })
}

/// Load the manifest stored at `path`.
pub fn load<P: AsRef<Path>>(path: P) -> Result<LoadedManifest, ResampleError> {
    let file = File::open(path.as_ref())?;
    read(BufReader::new(file))
}

/// Atomically write `entries` to `path`.
///
/// The lines are serialized into a temporary file next to `path` and renamed
/// over it once complete, so readers never observe a truncated manifest.
/// Missing parent directories are created.
pub fn save<'a, P, I>(path: P, entries: I) -> Result<(), ResampleError>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a ManifestEntry>,
{
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        for entry in entries {
            entry.write_line(&mut writer)?;
        }
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;

    Ok(())
}
