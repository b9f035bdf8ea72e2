// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Seekable directory stream over `opendir`/`readdir`/`seekdir`.

use std::ffi::CStr;
use std::ffi::OsStr;
use std::ffi::OsString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;

/// One entry produced while iterating a directory stream.
///
/// Carries only what the raw dirent supplies: name, inode number, and the
/// coarse `d_type` code. Callers that need full attributes issue a separate
/// attribute lookup per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: u64,
    /// Stream position just past this entry, suitable for a later `seek`.
    pub offset: i64,
    /// Raw `d_type` value as reported by the backing filesystem.
    pub type_: u8,
    pub name: OsString,
}

/// An open directory stream on a backing-store directory.
#[derive(Debug)]
pub struct ReadDir {
    dirp: *mut libc::DIR,
}

// SAFETY: ReadDir holds a DIR* which is only accessed by &mut self methods.
unsafe impl Send for ReadDir {}

impl ReadDir {
    /// Opens a stream on the directory at `path`.
    pub fn open(path: &CStr) -> io::Result<ReadDir> {
        // SAFETY: opendir reads the nul-terminated path and we check the
        // return value.
        let dirp = unsafe { libc::opendir(path.as_ptr()) };
        if dirp.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(ReadDir { dirp })
    }

    /// Descriptor underlying the stream, for syncing the directory itself.
    pub fn as_raw_fd(&self) -> RawFd {
        // SAFETY: dirp is valid for the life of self.
        unsafe { libc::dirfd(self.dirp) }
    }

    /// Positions the stream at `offset`, which must be zero or a value taken
    /// from a previously returned entry.
    pub fn seek(&mut self, offset: i64) {
        if offset == 0 {
            // SAFETY: dirp is valid for the life of self.
            unsafe { libc::rewinddir(self.dirp) };
        } else {
            // SAFETY: dirp is valid and the offset came from telldir.
            unsafe { libc::seekdir(self.dirp, offset as libc::c_long) };
        }
    }

    /// Returns the next entry, or `None` when the stream is exhausted.
    pub fn next_entry(&mut self) -> Option<DirEntry> {
        // SAFETY: dirp is valid; readdir returns a pointer into a buffer
        // owned by the stream.
        let ent = unsafe { libc::readdir(self.dirp) };
        if ent.is_null() {
            // End of stream. Read errors also land here and terminate the
            // listing, matching the backing primitive's own contract.
            return None;
        }
        // SAFETY: ent points at a valid dirent until the next readdir call.
        let ent = unsafe { &*ent };
        // SAFETY: dirp is valid; telldir reports the position after the
        // entry readdir just consumed.
        let offset = unsafe { libc::telldir(self.dirp) } as i64;
        // SAFETY: d_name is nul-terminated by the OS.
        let name = unsafe { CStr::from_ptr(ent.d_name.as_ptr()) };
        Some(DirEntry {
            ino: ent.d_ino as u64,
            offset,
            type_: ent.d_type,
            name: OsStr::from_bytes(name.to_bytes()).to_os_string(),
        })
    }
}

impl Drop for ReadDir {
    fn drop(&mut self) {
        // SAFETY: we own the DIR* and it is not used after this.
        unsafe { libc::closedir(self.dirp) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::fs::File;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    fn open_stream(path: &Path) -> ReadDir {
        let c = CString::new(path.as_os_str().as_bytes()).unwrap();
        ReadDir::open(&c).unwrap()
    }

    fn names(dir: &mut ReadDir) -> Vec<OsString> {
        let mut out = Vec::new();
        while let Some(entry) = dir.next_entry() {
            out.push(entry.name);
        }
        out
    }

    #[test]
    fn lists_dot_entries_and_files() {
        let tmp = tempfile::tempdir().unwrap();
        File::create(tmp.path().join("a.txt")).unwrap();
        File::create(tmp.path().join("b.txt")).unwrap();

        let mut dir = open_stream(tmp.path());
        let names = names(&mut dir);
        assert!(names.contains(&OsString::from(".")));
        assert!(names.contains(&OsString::from("..")));
        assert!(names.contains(&OsString::from("a.txt")));
        assert!(names.contains(&OsString::from("b.txt")));
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn open_missing_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        let c = CString::new(missing.as_os_str().as_bytes()).unwrap();
        let err = ReadDir::open(&c).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }

    #[test]
    fn open_non_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain");
        File::create(&file).unwrap();
        let c = CString::new(file.as_os_str().as_bytes()).unwrap();
        let err = ReadDir::open(&c).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOTDIR));
    }

    #[test]
    fn seek_resumes_after_an_entry() {
        let tmp = tempfile::tempdir().unwrap();
        File::create(tmp.path().join("a.txt")).unwrap();
        File::create(tmp.path().join("b.txt")).unwrap();

        let mut dir = open_stream(tmp.path());
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry() {
            entries.push(entry);
        }
        // Re-seek to just after the first entry and expect the remainder in
        // the same order.
        dir.seek(entries[0].offset);
        let rest = names(&mut dir);
        let expected: Vec<OsString> = entries[1..].iter().map(|e| e.name.clone()).collect();
        assert_eq!(rest, expected);
    }

    #[test]
    fn rewind_replays_the_stream() {
        let tmp = tempfile::tempdir().unwrap();
        File::create(tmp.path().join("a.txt")).unwrap();

        let mut dir = open_stream(tmp.path());
        let first = names(&mut dir);
        dir.seek(0);
        let second = names(&mut dir);
        assert_eq!(first, second);
    }
}
