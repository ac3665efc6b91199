use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ViewError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Dir,
    File,
    Other
}

/// The kind of what `path` points to (following symlinks), None if
/// there's nothing.
pub fn file_kind(path: &Path) -> Option<FileKind> {
    let meta = fs::metadata(path).ok()?;
    Some(if meta.is_dir() {
        FileKind::Dir
    } else if meta.is_file() {
        FileKind::File
    } else {
        FileKind::Other
    })
}

pub fn easy_filenames_in_dir<P>(
    path: P
) -> Result<impl Iterator<Item = Result<(OsString, FileKind), ViewError>>, ViewError>
where PathBuf: From<P>
{
    let pathbuf: PathBuf = path.into();
    Ok(fs::read_dir(&pathbuf).map_err(|e| ViewError::io(&pathbuf, e))?
       .map(
           move |entry_result: Result<fs::DirEntry, std::io::Error>|
                                      -> Result<(OsString, FileKind), ViewError>
           {
               let entry = entry_result.map_err(|e| ViewError::io(&pathbuf, e))?;
               let filename = entry.file_name();
               let kind = file_kind(&entry.path()).unwrap_or(FileKind::Other);
               Ok((filename, kind))
           }))
}

pub fn easy_filepaths_in_dir<P>(
    path: P
) -> Result<impl Iterator<Item = Result<(PathBuf, FileKind), ViewError>>, ViewError>
where PathBuf: From<P>,
      P: Clone
{
    let pathbuf: PathBuf = path.clone().into();
    Ok(easy_filenames_in_dir(path)?
        .map(move |v| -> Result<(PathBuf, FileKind), ViewError> {
            let (item, kind) = v?;
            let mut filepath = pathbuf.clone();
            filepath.push(item);
            Ok((filepath, kind))
        }))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// All files below `dir`, depth first, sorted by name within each
/// directory. Entries starting with a dot are skipped.
pub fn files_below(dir: &Path) -> Result<Vec<PathBuf>, ViewError> {
    let mut entries = easy_filepaths_in_dir(dir)?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let mut files = Vec::new();
    for (path, kind) in entries {
        if is_hidden(&path) {
            continue
        }
        match kind {
            FileKind::File => files.push(path),
            FileKind::Dir => files.extend(files_below(&path)?),
            FileKind::Other => (),
        }
    }
    Ok(files)
}

pub fn read_file(path: &Path) -> Result<String, ViewError> {
    fs::read_to_string(path).map_err(|e| ViewError::io(path, e))
}
