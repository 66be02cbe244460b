use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use image::{ImageFormat, ImageReader};

use crate::error::{Error, Result};

pub const IMAGE_EXTENSIONS: [&str; 6] = [".png", ".jpg", ".jpeg", ".gif", ".bmp", ".tiff"];

/// Number of names listed before the summary collapses into a remainder count.
pub const DISPLAY_LIMIT: usize = 10;

pub fn is_image_like(name: &str) -> bool {
    let name = name.to_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .any(|extension| name.ends_with(extension))
}

#[derive(Debug)]
pub enum EntryStatus {
    Readable {
        format: Option<ImageFormat>,
        width: u32,
        height: u32,
    },
    Unreadable(Error),
}

#[derive(Debug)]
pub struct ScanEntry {
    pub name: String,
    pub path: PathBuf,
    pub status: EntryStatus,
}

impl ScanEntry {
    fn probe(path: PathBuf, name: String) -> Self {
        let status = match read_header(&path) {
            Ok((format, (width, height))) => {
                tracing::debug!(%name, ?format, width, height, "image readable");
                EntryStatus::Readable {
                    format,
                    width,
                    height,
                }
            }
            Err(source) => {
                tracing::warn!(%name, error = %source, "image unreadable");
                EntryStatus::Unreadable(Error::EntryOpenFailed {
                    name: name.clone(),
                    source,
                })
            }
        };

        Self { name, path, status }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self.status, EntryStatus::Readable { .. })
    }

    pub fn warning(&self) -> Option<&Error> {
        match &self.status {
            EntryStatus::Unreadable(err) => Some(err),
            EntryStatus::Readable { .. } => None,
        }
    }
}

// The reader owns the file handle and is consumed here, so it is closed on
// every path before the next candidate is opened.
fn read_header(path: &Path) -> image::ImageResult<(Option<ImageFormat>, (u32, u32))> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format();
    let dimensions = reader.into_dimensions()?;

    Ok((format, dimensions))
}

#[derive(Debug)]
pub struct ScanReport {
    pub dir: PathBuf,
    pub entries: Vec<ScanEntry>,
}

impl ScanReport {
    pub fn empty(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn readable_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_readable()).count()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Error> {
        self.entries.iter().filter_map(ScanEntry::warning)
    }

    pub fn displayed(&self) -> impl Iterator<Item = &str> {
        self.names().take(DISPLAY_LIMIT)
    }

    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(DISPLAY_LIMIT)
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for warning in self.warnings() {
            writeln!(f, "  Warning: {warning}")?;
        }

        if self.is_empty() {
            return writeln!(f, "No image files found in the directory.");
        }

        writeln!(f, "Found {} image(s):", self.len())?;
        for name in self.displayed() {
            writeln!(f, "  - {name}")?;
        }
        if self.remaining() > 0 {
            writeln!(f, "  ... and {} more.", self.remaining())?;
        }

        Ok(())
    }
}

/// Renders a failed scan the way the trainer reports it.
pub struct ScanFailure<'a>(pub &'a Error);

impl fmt::Display for ScanFailure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Error::ListingFailed { source, .. } => write!(f, "Error listing images: {source}"),
            err => write!(f, "Error: {err}"),
        }
    }
}

/// Lists the image-like files directly inside `dir` and checks that each one
/// can be opened.
///
/// Entries that fail to open stay in the report with a warning attached.
/// Only a missing directory or a failed listing produce an error.
pub fn scan(dir: &Path) -> Result<ScanReport> {
    if !dir.exists() {
        return Err(Error::DirectoryNotFound(dir.to_path_buf()));
    }

    let listing_failed = |source: io::Error| Error::ListingFailed {
        path: dir.to_path_buf(),
        source,
    };

    // The lossy name is only for matching and display; the entry is opened
    // through its real path.
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir).map_err(listing_failed)? {
        let entry = entry.map_err(listing_failed)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_image_like(&name) {
            candidates.push((entry.path(), name));
        }
    }

    tracing::info!(dir = %dir.display(), candidates = candidates.len(), "scanning images");

    let entries = candidates
        .into_iter()
        .map(|(path, name)| ScanEntry::probe(path, name))
        .collect();

    Ok(ScanReport {
        dir: dir.to_path_buf(),
        entries,
    })
}
