// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Mounts a mirror of an existing directory tree.

use std::process::exit;

use anyhow::Context;
use argh::FromArgs;
use log::error;

use mirrorfs::config::Args;
use mirrorfs::config::Config;
use mirrorfs::PassthroughFs;

fn run(args: Args) -> anyhow::Result<()> {
    let cfg = Config::from_args(args).context("invalid configuration")?;
    let fs = PassthroughFs::new(&cfg.root)
        .with_context(|| format!("failed to open backing root {}", cfg.root.display()))?;
    let options = cfg.mount_options();
    fuser::mount2(fs, &cfg.mount_point, &options)
        .with_context(|| format!("failed to mount on {}", cfg.mount_point.display()))?;
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let parsed = match Args::from_args(&args[..1], &args[1..]) {
        Ok(args) => args,
        // Help and usage errors land here; the decision to print and exit is
        // made once, at this call site.
        Err(early) => match early.status {
            Ok(()) => {
                println!("{}", early.output);
                exit(0);
            }
            Err(()) => {
                eprintln!("{}", early.output);
                exit(1);
            }
        },
    };

    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    if let Err(e) = run(parsed) {
        error!("{:#}", e);
        exit(1);
    }
}
