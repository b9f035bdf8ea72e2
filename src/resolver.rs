// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Translation of virtual paths into backing-store paths.
//!
//! A virtual path is a path relative to the mount root. Resolution prefixes
//! it with the backing root and nothing else: no component normalization and
//! no symlink resolution happen here. Whatever `..` components or symlinks
//! the path contains are resolved by the backing filesystem when the call is
//! actually made.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::path::PathBuf;

fn name_too_long() -> io::Error {
    io::Error::from_raw_os_error(libc::ENAMETOOLONG)
}

/// Maps virtual paths to backing paths under a fixed root.
///
/// The root is set once at construction and never changes for the life of
/// the process. The resolver is the only state the operation handlers share,
/// which keeps them safe to run concurrently.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(root: PathBuf) -> PathResolver {
        PathResolver { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a virtual path to its absolute backing path.
    ///
    /// Fails with `ENAMETOOLONG` before any backing call if the joined path
    /// would not fit in a `PATH_MAX` buffer, so an oversized request can
    /// never reach the backing store with a corrupted path.
    pub fn resolve(&self, vpath: &Path) -> io::Result<PathBuf> {
        let full = self.root.join(vpath);
        // One extra byte for the nul terminator at the syscall boundary.
        if full.as_os_str().len() + 1 > libc::PATH_MAX as usize {
            return Err(name_too_long());
        }
        Ok(full)
    }

    /// Resolves a virtual path into the nul-terminated form the libc call
    /// sites need.
    pub fn resolve_c(&self, vpath: &Path) -> io::Result<CString> {
        let full = self.resolve(vpath)?;
        CString::new(full.as_os_str().as_bytes().to_vec())
            .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))
    }
}
