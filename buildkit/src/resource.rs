use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::*;
use walkdir::WalkDir;

use crate::constants::RESOURCES;
use crate::pattern;

/// One line of the resource table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceEntry {
    /// A directory copied whole.
    Dir(&'static str),
    /// Files under `dir`, at any depth, whose name matches `pattern`.
    Glob {
        dir: &'static str,
        pattern: &'static str,
    },
}

impl ResourceEntry {
    pub fn parse(entry: &'static str) -> Self {
        if !entry.contains('*') {
            return Self::Dir(entry);
        }

        match entry.split_once('/') {
            Some((dir, pattern)) => Self::Glob { dir, pattern },
            None => Self::Glob {
                dir: entry,
                pattern: "*",
            },
        }
    }
}

/// The fixed resource table, in declaration order.
pub fn resources() -> impl Iterator<Item = ResourceEntry> {
    RESOURCES.iter().copied().map(ResourceEntry::parse)
}

/// Stages resources from a source tree into a build tree.
///
/// Copies merge into the destination: existing files are overwritten and
/// files with no counterpart in the source are left alone.
#[derive(Clone, Debug)]
pub struct ResourceCopier {
    source: PathBuf,
    build: PathBuf,
}

impl ResourceCopier {
    pub fn new(source: impl Into<PathBuf>, build: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            build: build.into(),
        }
    }

    /// Copies every entry of the resource table. The first filesystem error
    /// aborts the remaining entries.
    pub fn copy_all(&self) -> Result<()> {
        for entry in resources() {
            match entry {
                ResourceEntry::Dir(name) => self.copy_dir(name)?,
                ResourceEntry::Glob { dir, pattern } => self.copy_matching(dir, pattern)?,
            }
        }
        Ok(())
    }

    /// Merges `source/name` into `build/name`. A missing source directory is
    /// only a warning.
    pub fn copy_dir(&self, name: &str) -> Result<()> {
        let src = self.source.join(name);
        let dst = self.build.join(name);

        if !src.exists() {
            warn!("{} does not exist", name);
            return Ok(());
        }

        for entry in WalkDir::new(&src).follow_links(true) {
            let entry = entry.with_context(|| format!("Failed to read {}", src.display()))?;
            let relative = entry.path().strip_prefix(&src)?;
            let target = dst.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)
                    .with_context(|| format!("Failed to create {}", target.display()))?;
            } else {
                copy_file(entry.path(), &target)?;
            }
        }

        info!("Copied {}/", name);
        Ok(())
    }

    /// Copies the files under `source/dir` matching `pattern` into
    /// `build/dir`, keeping their relative layout. `build/dir` is created even
    /// when nothing matches.
    pub fn copy_matching(&self, dir: &str, pattern: &str) -> Result<()> {
        let src = self.source.join(dir);
        let dst = self.build.join(dir);
        fs::create_dir_all(&dst).with_context(|| format!("Failed to create {}", dst.display()))?;

        for file in pattern::find_files(&src, pattern) {
            let relative = file.strip_prefix(&src)?;
            let target = dst.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            copy_file(&file, &target)?;
            info!("Copied {}/{}", dir, relative.display());
        }

        Ok(())
    }
}

/// Copies contents and permissions, then carries over access and modification
/// times.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;

    let metadata =
        fs::metadata(src).with_context(|| format!("Failed to stat {}", src.display()))?;
    let times = FileTimes::new()
        .set_accessed(metadata.accessed()?)
        .set_modified(metadata.modified()?);

    open_for_times(dst)
        .and_then(|file| file.set_times(times))
        .with_context(|| format!("Failed to set times on {}", dst.display()))?;

    trace!("{} -> {}", src.display(), dst.display());
    Ok(())
}

/// Opens `path` so its times can be set even when the copied permissions
/// made it read-only. Setting times needs ownership, not write access.
#[cfg(not(windows))]
fn open_for_times(path: &Path) -> std::io::Result<File> {
    File::open(path)
}

#[cfg(windows)]
fn open_for_times(path: &Path) -> std::io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_WRITE_ATTRIBUTES: u32 = 0x0100;
    File::options().access_mode(FILE_WRITE_ATTRIBUTES).open(path)
}

/// Copies the resource table from `source` into `build`.
pub fn copy(source: impl AsRef<Path>, build: impl AsRef<Path>) -> Result<()> {
    ResourceCopier::new(source.as_ref(), build.as_ref()).copy_all()
}
