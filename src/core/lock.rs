// Advisory exclusive lock held by a columnar writer for the life of its file handle.
use std::fs::File;
use std::io;
use std::path::Path;

use fs2::FileExt;
use libc::{EACCES, EPERM};

use crate::core::error::{Error, ErrorKind};

/// Takes the lock without blocking; a held lock surfaces as `Busy`.
pub fn try_lock_exclusive(file: &File, path: &Path) -> Result<(), Error> {
    file.try_lock_exclusive().map_err(|err| {
        let kind = lock_error_kind(&err);
        let mut error = Error::new(kind)
            .with_message("failed to lock output file")
            .with_path(path);
        if kind == ErrorKind::Busy {
            error = error.with_hint(
                "Another writer holds this file open. Wait for it or pick another output path.",
            );
        }
        error.with_source(err)
    })
}

fn lock_error_kind(err: &io::Error) -> ErrorKind {
    let errno = err.raw_os_error().unwrap_or_default();
    if errno == EACCES || errno == EPERM {
        return ErrorKind::Permission;
    }
    if err.kind() == fs2::lock_contended_error().kind() {
        return ErrorKind::Busy;
    }
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}
