use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{FileSystemError, FileSystemResult};

/// Creates a directory structure if it doesn't exist.
///
/// If the directory already exists, this function does nothing. If the path exists but is
/// not a directory, this function returns an error.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the directory could not be created.
/// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
///
/// # Example
///
/// ```no_run
/// use ghmpkg_utils::error::FileSystemResult;
/// use ghmpkg_utils::fs::ensure_dir_exists;
///
/// fn main() -> FileSystemResult<()> {
///     ensure_dir_exists("migration-packages/export/npm")?;
///     Ok(())
/// }
/// ```
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path).map_err(|err| FileSystemError::Directory {
            path: path.to_path_buf(),
            action: "create",
            source: err,
        })?;
    } else if !path.is_dir() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}

/// Removes the specified file or directory safely.
///
/// If the path does not exist, this function returns `Ok(())`. Directories are removed
/// recursively.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();

    if !path.exists() {
        return Ok(());
    }

    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|err| FileSystemError::File {
        path: path.to_path_buf(),
        action: "remove",
        source: err,
    })
}

/// Reads a file into a string.
pub fn read_file_string<P: AsRef<Path>>(path: P) -> FileSystemResult<String> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|err| FileSystemError::File {
        path: path.to_path_buf(),
        action: "read",
        source: err,
    })
}

/// Writes `contents` to `path`, creating the parent directory when missing.
pub fn write_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> FileSystemResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir_exists(parent)?;
        }
    }
    fs::write(path, contents).map_err(|err| FileSystemError::File {
        path: path.to_path_buf(),
        action: "write",
        source: err,
    })
}

/// Applies `edit` to the file's contents and writes the result back when it changed.
///
/// Returns `true` if the file was rewritten.
pub fn edit_file<P, F>(path: P, edit: F) -> FileSystemResult<bool>
where
    P: AsRef<Path>,
    F: FnOnce(&str) -> String,
{
    let path = path.as_ref();
    let original = read_file_string(path)?;
    let updated = edit(&original);
    if updated == original {
        return Ok(false);
    }
    write_file(path, updated)?;
    Ok(true)
}

/// Sibling path a file is written to before it is moved into place.
pub fn partial_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Runs `write` against the [`partial_path`] of `dest` and renames the result onto `dest`
/// once `write` succeeds.
///
/// On error the partial file is removed, so `dest` only ever holds a complete file.
pub fn write_through_partial<P, T, E, F>(dest: P, write: F) -> Result<T, E>
where
    P: AsRef<Path>,
    E: From<FileSystemError>,
    F: FnOnce(&Path) -> Result<T, E>,
{
    let dest = dest.as_ref();
    let partial = partial_path(dest);
    let value = match write(&partial) {
        Ok(value) => value,
        Err(err) => {
            safe_remove(&partial).ok();
            return Err(err);
        }
    };

    if let Err(err) = fs::rename(&partial, dest) {
        safe_remove(&partial).ok();
        return Err(FileSystemError::File {
            path: dest.to_path_buf(),
            action: "finalize",
            source: err,
        }
        .into());
    }
    Ok(value)
}

/// Lists the regular files directly inside `dir`, sorted by file name.
///
/// A missing directory yields an empty list.
pub fn list_files<P: AsRef<Path>>(dir: P) -> FileSystemResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    if !dir.is_dir() {
        return Err(FileSystemError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let entries = fs::read_dir(dir).map_err(|err| FileSystemError::Directory {
        path: dir.to_path_buf(),
        action: "read",
        source: err,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| FileSystemError::Directory {
            path: dir.to_path_buf(),
            action: "read",
            source: err,
        })?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
