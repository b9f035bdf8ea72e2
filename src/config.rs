// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Command-line arguments and their validated form.
//!
//! Parsing is a pure step: it returns either arguments, or a typed signal
//! (help requested / bad usage) for the caller to act on. Nothing in here
//! prints or exits.

use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

use argh::FromArgs;
use fuser::MountOption;
use remain::sorted;
use thiserror::Error as ThisError;

#[sorted]
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("failed to determine current directory: {0}")]
    CurrentDir(io::Error),
    #[error("backing root {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to stat backing root {path}: {source}")]
    Stat { path: PathBuf, source: io::Error },
}

/// Mirror an existing directory tree at a mount point, forwarding every
/// filesystem operation to the backing directory.
#[derive(FromArgs, Debug, PartialEq)]
pub struct Args {
    /// backing directory to mirror
    #[argh(option, short = 'F', long = "root")]
    pub root: PathBuf,

    /// allow other users to access the mount
    #[argh(switch)]
    pub allow_other: bool,

    /// unmount automatically when the process exits
    #[argh(switch)]
    pub auto_unmount: bool,

    /// filesystem name reported to the kernel (default: mirrorfs)
    #[argh(option, default = "String::from(\"mirrorfs\")")]
    pub fs_name: String,

    /// directory to mount the mirrored tree on
    #[argh(positional)]
    pub mount_point: PathBuf,
}

/// Validated startup configuration, immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub mount_point: PathBuf,
    pub allow_other: bool,
    pub auto_unmount: bool,
    pub fs_name: String,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Config, Error> {
        let root = if args.root.is_absolute() {
            args.root
        } else {
            env::current_dir().map_err(Error::CurrentDir)?.join(args.root)
        };

        let meta = fs::metadata(&root).map_err(|e| Error::Stat {
            path: root.clone(),
            source: e,
        })?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory(root));
        }

        Ok(Config {
            root,
            mount_point: args.mount_point,
            allow_other: args.allow_other,
            auto_unmount: args.auto_unmount,
            fs_name: args.fs_name,
        })
    }

    pub fn mount_options(&self) -> Vec<MountOption> {
        let mut options = vec![MountOption::FSName(self.fs_name.clone())];
        if self.allow_other {
            options.push(MountOption::AllowOther);
        }
        if self.auto_unmount {
            options.push(MountOption::AutoUnmount);
        }
        options
    }
}
