//! In-process archive handling for npm tarballs and NuGet packages.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use flate2::read::GzDecoder;
use ghmpkg_utils::fs::ensure_dir_exists;
use tar::Archive;
use tracing::debug;
use zip::{ZipArchive, ZipWriter};

use crate::error::{ErrorContext, Result};

/// Extracts a gzip-compressed tarball into `dest`.
pub fn extract_tgz(archive: &Path, dest: &Path) -> Result<()> {
    ensure_dir_exists(dest)?;
    let file = File::open(archive)
        .with_context(|| format!("opening archive {}", archive.display()))?;
    let mut tar = Archive::new(GzDecoder::new(BufReader::new(file)));
    tar.set_preserve_permissions(false);
    tar.unpack(dest)
        .with_context(|| format!("extracting {} to {}", archive.display(), dest.display()))?;
    debug!(archive = %archive.display(), dest = %dest.display(), "extracted tarball");
    Ok(())
}

/// Removes the named entries from a zip archive in place.
///
/// Entries are copied raw, without recompression. Returns the number of entries removed;
/// when nothing matches the archive is left untouched.
pub fn strip_zip_entries(path: &Path, names: &[&str]) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut source = ZipArchive::new(BufReader::new(file))?;

    let matches = source
        .file_names()
        .filter(|name| names.contains(name))
        .count();
    if matches == 0 {
        return Ok(0);
    }

    let tmp_path = path.with_extension("tmp");
    let tmp = File::create(&tmp_path)
        .with_context(|| format!("creating {}", tmp_path.display()))?;
    let mut writer = ZipWriter::new(BufWriter::new(tmp));

    let mut removed = 0;
    for idx in 0..source.len() {
        let entry = source.by_index_raw(idx)?;
        if names.contains(&entry.name()) {
            removed += 1;
            continue;
        }
        writer.raw_copy_file(entry)?;
    }
    writer.finish()?;
    drop(source);

    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("replacing {}", path.display()))?;
    debug!(path = %path.display(), removed, "stripped zip entries");
    Ok(removed)
}
