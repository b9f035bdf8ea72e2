// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Passthrough filesystem that mirrors an existing directory tree.
//!
//! Every operation on the mount is forwarded to the equivalent operation on
//! the backing directory, with no caching in between. The kernel-facing side
//! is handled by `fuser`; this crate supplies the operation table, the
//! virtual-to-backing path translation, and the open-handle lifecycle.

pub mod config;
mod handle;
pub mod passthrough;
pub mod read_dir;
pub mod resolver;

pub use crate::passthrough::PassthroughFs;
