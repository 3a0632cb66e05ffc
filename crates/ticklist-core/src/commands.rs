use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::config::Config;
use crate::error::SyncError;
use crate::render::Renderer;
use crate::service::TodoService;
use crate::sync::{Reconciliation, ViewSync};
use crate::todo::TodoId;
use crate::view::ViewKey;

pub fn known_command_names() -> Vec<&'static str> {
    vec!["add", "list", "toggle", "delete", "help", "version"]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(sync, cfg, renderer, inv), fields(command = %inv.command))]
pub async fn dispatch<S>(
    sync: &ViewSync<S>,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
) -> anyhow::Result<()>
where
    S: TodoService,
{
    debug!(args = ?inv.command_args, "dispatching command");

    match inv.command.as_str() {
        "add" => cmd_add(sync, cfg, renderer, &inv.command_args).await,
        "list" => cmd_list(sync, cfg, renderer, &inv.command_args).await,
        "toggle" => cmd_toggle(sync, cfg, renderer, &inv.command_args).await,
        "delete" => cmd_delete(sync, cfg, renderer, &inv.command_args).await,
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

async fn cmd_add<S: TodoService>(
    sync: &ViewSync<S>,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let body = args.join(" ");
    let (todo, reconciliation) = sync.create_todo(&body).await?;
    info!(id = todo.id, "command add");
    println!("Created todo {}.", todo.id);

    report(&reconciliation);
    show(sync, renderer, cfg.default_view()?)
}

async fn cmd_list<S: TodoService>(
    sync: &ViewSync<S>,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let view = match args {
        [] => cfg.default_view()?,
        [name] => name.parse()?,
        _ => return Err(anyhow!("usage: ticklist list [all|pending|completed]")),
    };

    let reconciliation = sync.load_all().await;
    if let Some(err) = reconciliation
        .failures
        .iter()
        .find(|err| matches!(err, SyncError::TransientFetchFailure { view: v, .. } if *v == view))
    {
        return Err(err.clone()).context("could not load todos");
    }
    report(&reconciliation);
    show(sync, renderer, view)
}

async fn cmd_toggle<S: TodoService>(
    sync: &ViewSync<S>,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let id = parse_id(args, "toggle")?;

    // The toggle sends the opposite of the status we last saw.
    sync.refresh(ViewKey::All).await?;
    let todo = sync.find(id).ok_or(SyncError::NotFound { id })?;

    let reconciliation = sync.toggle_status(&todo).await?;
    println!("Todo {id} is now {}.", todo.status.toggled());

    report(&reconciliation);
    show(sync, renderer, cfg.default_view()?)
}

async fn cmd_delete<S: TodoService>(
    sync: &ViewSync<S>,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let id = parse_id(args, "delete")?;
    let reconciliation = sync.delete_todo(id).await?;
    println!("Deleted todo {id}.");

    report(&reconciliation);
    show(sync, renderer, cfg.default_view()?)
}

fn cmd_help() -> anyhow::Result<()> {
    println!("Usage: ticklist [OPTIONS] <command> [args]");
    println!();
    println!("Commands:");
    println!("  list [all|pending|completed]  show a view (default: rc.default.view)");
    println!("  add <body...>                 create a pending todo");
    println!("  toggle <id>                   flip a todo between pending and completed");
    println!("  delete <id>                   remove a todo");
    println!("  help | version");
    println!();
    println!("Commands may be abbreviated to any unique prefix.");
    Ok(())
}

fn parse_id(args: &[String], command: &str) -> anyhow::Result<TodoId> {
    match args {
        [raw] => raw
            .parse()
            .with_context(|| format!("invalid todo id: {raw}")),
        _ => Err(anyhow!("usage: ticklist {command} <id>")),
    }
}

fn report(reconciliation: &Reconciliation) {
    for err in &reconciliation.failures {
        warn!(error = %err, "view left stale");
        eprintln!("warning: {err}; showing last known data");
    }
}

fn show<S: TodoService>(sync: &ViewSync<S>, renderer: &Renderer, view: ViewKey) -> anyhow::Result<()> {
    let counts = ViewKey::ALL.map(|key| (key, sync.entry(key).data.len()));
    renderer.print_view(view, counts, &sync.rows(view))
}

#[cfg(test)]
mod tests {
    use super::{expand_command_abbrev, known_command_names};

    #[test]
    fn unique_prefixes_expand() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("l", &known), Some("list"));
        assert_eq!(expand_command_abbrev("del", &known), Some("delete"));
        assert_eq!(expand_command_abbrev("toggle", &known), Some("toggle"));
        assert_eq!(expand_command_abbrev("x", &known), None);
    }
}
