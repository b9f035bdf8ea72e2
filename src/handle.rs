// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Table of open file and directory handles.
//!
//! Handles are opaque u64 ids handed to the kernel on open/opendir and given
//! back on every read, write, listing, and release. The payload is a tagged
//! value so a file handle can never be used where a directory handle is
//! expected; the mismatch surfaces as `EBADF`, the same as a stale id.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use crate::read_dir::ReadDir;

pub type Handle = u64;

pub(crate) fn ebadf() -> io::Error {
    io::Error::from_raw_os_error(libc::EBADF)
}

/// Payload of one live handle.
#[derive(Debug)]
pub enum HandleData {
    File {
        file: File,
        /// Open flags the descriptor was created with; consulted when a
        /// size change wants to reuse the descriptor for ftruncate.
        flags: i32,
    },
    Dir {
        stream: Mutex<ReadDir>,
    },
}

impl HandleData {
    pub fn as_file(&self) -> io::Result<(&File, i32)> {
        match self {
            HandleData::File { file, flags } => Ok((file, *flags)),
            HandleData::Dir { .. } => Err(ebadf()),
        }
    }

    pub fn as_dir(&self) -> io::Result<&Mutex<ReadDir>> {
        match self {
            HandleData::Dir { stream } => Ok(stream),
            HandleData::File { .. } => Err(ebadf()),
        }
    }
}

/// Allocates handle ids and owns the live handle payloads.
///
/// Ids are never reused within the life of the table, so a release followed
/// by any operation on the released id reliably fails instead of hitting
/// whatever handle was opened next.
#[derive(Debug)]
pub struct HandleTable {
    next_handle: AtomicU64,
    handles: Mutex<BTreeMap<Handle, Arc<HandleData>>>,
}

impl HandleTable {
    pub fn new() -> HandleTable {
        HandleTable {
            next_handle: AtomicU64::new(1),
            handles: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, data: HandleData) -> Handle {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.handles.lock().unwrap().insert(handle, Arc::new(data));
        handle
    }

    pub fn get(&self, handle: Handle) -> Option<Arc<HandleData>> {
        self.handles.lock().unwrap().get(&handle).cloned()
    }

    /// Removes a file handle, closing its descriptor. A directory handle or
    /// an unknown id is a caller error and leaves the table untouched.
    pub fn remove_file(&self, handle: Handle) -> io::Result<()> {
        let mut handles = self.handles.lock().unwrap();
        match handles.entry(handle) {
            btree_map::Entry::Occupied(e) => {
                if let HandleData::File { .. } = **e.get() {
                    e.remove();
                    Ok(())
                } else {
                    Err(ebadf())
                }
            }
            btree_map::Entry::Vacant(_) => Err(ebadf()),
        }
    }

    /// Removes a directory handle, closing its stream.
    pub fn remove_dir(&self, handle: Handle) -> io::Result<()> {
        let mut handles = self.handles.lock().unwrap();
        match handles.entry(handle) {
            btree_map::Entry::Occupied(e) => {
                if let HandleData::Dir { .. } = **e.get() {
                    e.remove();
                    Ok(())
                } else {
                    Err(ebadf())
                }
            }
            btree_map::Entry::Vacant(_) => Err(ebadf()),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handles.lock().unwrap().len()
    }
}
