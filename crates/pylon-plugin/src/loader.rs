//! Loaders that read a plugin bundle's contents, whether it lives on disk
//! or packed inside a zip archive.

use std::io::Read;
use std::path::{Path, PathBuf};

/// Read-only access to a plugin bundle's files, independent of whether the
/// bundle is unpacked on disk or still packed in an archive.
pub trait ModuleLoader: Send + Sync {
    /// Returns whether `path` (relative to the bundle root) exists as a file.
    fn has_file(&self, path: &str) -> bool;

    /// Returns whether `path` (relative to the bundle root) exists as a
    /// directory.
    fn has_directory(&self, path: &str) -> bool;

    /// Reads a file's full contents.
    fn get_data(&self, path: &str) -> std::io::Result<Vec<u8>>;

    /// Returns a filesystem path to the bundle's contents, extracting to a
    /// temporary directory first if the loader doesn't already have one
    /// (e.g. an archive loader extracting to disk so the plugin's own
    /// process can be spawned against a real path).
    fn materialize(&self) -> std::io::Result<PathBuf>;
}

/// Loads a plugin bundle that is already unpacked on disk.
pub struct FilesystemLoader {
    root: PathBuf,
}

impl FilesystemLoader {
    /// Creates a loader rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ModuleLoader for FilesystemLoader {
    fn has_file(&self, path: &str) -> bool {
        self.root.join(path).is_file()
    }

    fn has_directory(&self, path: &str) -> bool {
        self.root.join(path).is_dir()
    }

    fn get_data(&self, path: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.root.join(path))
    }

    fn materialize(&self) -> std::io::Result<PathBuf> {
        Ok(self.root.clone())
    }
}

/// Loads a plugin bundle packed as a zip archive, without unpacking it
/// until [`ModuleLoader::materialize`] is actually called.
pub struct ArchiveLoader {
    archive_path: PathBuf,
    entries: Vec<String>,
}

impl ArchiveLoader {
    /// Opens a zip archive at `archive_path` and indexes its entry names.
    pub fn open(archive_path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let archive_path = archive_path.into();
        let file = std::fs::File::open(&archive_path)?;
        let archive = zip::ZipArchive::new(file)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        let entries = archive.file_names().map(|name| name.to_string()).collect();
        Ok(Self {
            archive_path,
            entries,
        })
    }

    fn open_archive(&self) -> std::io::Result<zip::ZipArchive<std::fs::File>> {
        let file = std::fs::File::open(&self.archive_path)?;
        zip::ZipArchive::new(file)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}

impl ModuleLoader for ArchiveLoader {
    fn has_file(&self, path: &str) -> bool {
        self.entries.iter().any(|entry| entry == path)
    }

    fn has_directory(&self, path: &str) -> bool {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.entries.iter().any(|entry| entry.starts_with(&prefix))
    }

    fn get_data(&self, path: &str) -> std::io::Result<Vec<u8>> {
        let mut archive = self.open_archive()?;
        let mut entry = archive
            .by_name(path)
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::NotFound))?;
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn materialize(&self) -> std::io::Result<PathBuf> {
        let dest = std::env::temp_dir().join(format!(
            "pylon-plugin-{}",
            uuid_like_suffix(&self.archive_path)
        ));
        std::fs::create_dir_all(&dest)?;
        let mut archive = self.open_archive()?;
        archive
            .extract(&dest)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        Ok(dest)
    }
}

/// Derives a stable, filesystem-safe suffix from an archive path so repeat
/// extractions of the same archive land in the same temp directory.
fn uuid_like_suffix(path: &Path) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}
