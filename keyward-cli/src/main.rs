// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

mod cli;
mod commands;
mod config;
mod output;

use std::sync::atomic::{AtomicU64, Ordering};

use clap::Parser;
use tracing::debug;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use keyward_core::error::{KeywardError, Result};

use crate::cli::*;
use crate::config::Config;
use crate::output::Output;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_request_id() -> String {
    let id = REQUEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("req-{id:08x}")
}

fn init_logging(default_level: &str) {
    let use_json = std::env::var("KEYWARD_LOG_JSON").is_ok();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() {
    let out = Output::new();
    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            out.error(&e.to_string());
            std::process::exit(1);
        }
    };
    init_logging(&cfg.log_level.to_string());

    if let Err(e) = run(&out, &cfg) {
        out.failure(&e);
        std::process::exit(1);
    }
}

#[tracing::instrument(skip(out, cfg), fields(request_id = %next_request_id()))]
fn run(out: &Output, cfg: &Config) -> Result<()> {
    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(p) => p,
        None => cfg.data_dir()?,
    };
    debug!(data_dir = %data_dir.display(), "starting command");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| KeywardError::Other(format!("Runtime error: {e}")))?;

    rt.block_on(async {
        match cli.command {
            Commands::Mnemonic { command } => match command {
                MnemonicCommands::Generate { words } => commands::mnemonic::cmd_generate(out, words),
            },
            Commands::Key { command } => dispatch_key(out, &data_dir, cfg, command).await,
            Commands::Backup { command } => {
                let backup_dir = match cli.backup_dir {
                    Some(p) => p,
                    None => cfg.backup_dir(&data_dir),
                };
                dispatch_backup(out, &backup_dir, cfg, command).await
            }
        }
    })
}

async fn dispatch_key(
    out: &Output,
    data_dir: &std::path::Path,
    cfg: &Config,
    command: KeyCommands,
) -> Result<()> {
    let ctx = commands::key::KeyContext::open(data_dir, cfg)?;
    match command {
        KeyCommands::Import {
            prefix,
            algorithm,
            hash,
        } => commands::key::cmd_import(out, &ctx, &prefix, algorithm.into(), hash.map(Into::into)),
        KeyCommands::Show { prefix } => commands::key::cmd_show(out, &ctx, &prefix).await,
        KeyCommands::List => commands::key::cmd_list(out, &ctx),
        KeyCommands::Diagnose { prefix } => commands::key::cmd_diagnose(out, &ctx, &prefix).await,
        KeyCommands::Delete { prefix } => commands::key::cmd_delete(out, &ctx, &prefix),
        KeyCommands::Migrate { prefixes, force } => {
            commands::key::cmd_migrate(out, &ctx, prefixes, force).await
        }
    }
}

async fn dispatch_backup(
    out: &Output,
    backup_dir: &std::path::Path,
    cfg: &Config,
    command: BackupCommands,
) -> Result<()> {
    let manager = commands::backup::open_manager(backup_dir, cfg)?;
    match command {
        BackupCommands::Upload {
            user_id,
            address,
            name,
            algorithm,
            key_index,
        } => {
            let identity = keyward_core::backup::BackupIdentity {
                address,
                user_id,
                user_name: name,
                user_avatar: String::new(),
                key_index,
            };
            commands::backup::cmd_upload(out, &manager, &identity, algorithm.into()).await
        }
        BackupCommands::List => commands::backup::cmd_list(out, &manager).await,
        BackupCommands::Restore { user_id } => {
            commands::backup::cmd_restore(out, &manager, &user_id).await
        }
        BackupCommands::Delete { user_id } => {
            commands::backup::cmd_delete(out, &manager, &user_id).await
        }
        BackupCommands::Check { user_id, keys } => {
            commands::backup::cmd_check(out, &manager, &user_id, &keys).await
        }
    }
}
