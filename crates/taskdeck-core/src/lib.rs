pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod datetime;
pub mod projection;
pub mod remote;
pub mod render;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let pre = cli::preprocess_args(&raw_args)?;
    let cli = cli::GlobalCli::parse_from(pre.cleaned_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting taskdeck CLI"
    );
    debug!(?pre.rc_overrides, "preprocessed rc overrides");

    let mut cfg = config::Config::load(cli.taskdeckrc.as_deref())?;
    cfg.apply_overrides(
        pre.rc_overrides
            .into_iter()
            .chain(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value))),
    );

    let inv = cli::Invocation::parse(&cfg, cli.rest)?;

    // help/version need neither a session nor a runtime.
    match inv.command.as_str() {
        "help" => {
            commands::print_help();
            return Ok(());
        }
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let session =
        config::resolve_session(&cfg).context("failed to resolve API session")?;
    let store = remote::RemoteStore::new(&session.base_url, &session.token)
        .context("failed to build remote store")?;

    let mut renderer = render::Renderer::new(&cfg)?;
    let mut dashboard = controller::Dashboard::new(store);

    let runtime =
        tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(commands::dispatch(&mut dashboard, &cfg, &mut renderer, inv))?;

    info!("done");
    Ok(())
}
