use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SetupError};

/// Store metadata shipped inside app archives; never copied to the card.
pub const SKIP_LIST: &[&str] = &[
    "manifest.install",
    "info.json",
    "versions.json",
    "screen1.png",
    "screen2.png",
    "src",
];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    pub files_written: usize,
    pub dirs_created: usize,
    pub skipped: usize,
}

/// Unpacks one local archive.
pub trait Extractor {
    fn extract(&self, archive: &Path) -> Result<ExtractReport>;
}

/// Writes zip entries below `root`, the top of the removable storage.
pub struct ZipExtractor {
    root: PathBuf,
}

impl ZipExtractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ZipExtractor { root: root.into() }
    }

    /// An entry is skipped when its top-level component is in the skip-list.
    pub fn is_skipped(entry_name: &str) -> bool {
        entry_name
            .split('/')
            .find(|part| !part.is_empty() && *part != ".")
            .is_some_and(|first| SKIP_LIST.contains(&first))
    }

    fn create_dir(path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|source| SetupError::DirectoryCreate {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Extractor for ZipExtractor {
    fn extract(&self, archive_path: &Path) -> Result<ExtractReport> {
        let open_err = |source| SetupError::ArchiveOpen {
            path: archive_path.to_path_buf(),
            source,
        };
        let file = File::open(archive_path).map_err(|e| open_err(zip::result::ZipError::Io(e)))?;
        let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(open_err)?;

        let mut report = ExtractReport::default();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| SetupError::ArchiveEntryRead {
                    path: archive_path.to_path_buf(),
                    index,
                    reason: e.to_string(),
                })?;

            let name = entry.name().to_string();
            if Self::is_skipped(&name) {
                tracing::debug!("Skipping metadata entry {}", name);
                report.skipped += 1;
                continue;
            }

            let relative = entry
                .enclosed_name()
                .ok_or_else(|| SetupError::UnsafeEntry { name: name.clone() })?;
            let target = self.root.join(relative);

            if entry.is_dir() {
                Self::create_dir(&target)?;
                report.dirs_created += 1;
                continue;
            }

            if let Some(parent) = target.parent() {
                Self::create_dir(parent)?;
            }

            let out = File::create(&target).map_err(|source| SetupError::FileWrite {
                path: target.clone(),
                source,
            })?;
            let mut writer = BufWriter::new(out);
            io::copy(&mut entry, &mut writer).map_err(|e| SetupError::ArchiveEntryRead {
                path: archive_path.to_path_buf(),
                index,
                reason: e.to_string(),
            })?;
            writer.flush().map_err(|source| SetupError::FileWrite {
                path: target.clone(),
                source,
            })?;
            report.files_written += 1;
        }

        tracing::info!(
            "Extracted {}: {} files, {} directories, {} skipped",
            archive_path.display(),
            report.files_written,
            report.dirs_created,
            report.skipped
        );
        Ok(report)
    }
}
