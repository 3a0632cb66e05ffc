pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod error;
pub mod hooks;
pub mod memory;
pub mod render;
pub mod service;
pub mod sync;
pub mod todo;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use futures::executor::block_on;
use tracing::{
  debug,
  info
};

pub use error::SyncError;
pub use service::{
  ServiceError,
  TodoService
};
pub use sync::{
  Reconciliation,
  ViewSync
};
pub use todo::{
  Status,
  Todo,
  TodoId
};
pub use view::{
  ViewKey,
  VisualState,
  status_to_visual_state
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting ticklist"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.todorc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    datastore::FileTodoService::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  let sync = ViewSync::new(store);
  block_on(commands::dispatch(
    &sync, &cfg, &renderer, inv
  ))?;

  info!("done");
  Ok(())
}
