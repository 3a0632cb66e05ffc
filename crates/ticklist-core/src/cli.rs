use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = split_setting(s).ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

/// Splits `KEY=VALUE` or `KEY:VALUE`. `=` takes precedence so values may
/// contain colons.
fn split_setting(s: &str) -> Option<(&str, &str)> {
    s.split_once('=').or_else(|| s.split_once(':'))
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ticklist",
    version,
    about = "Ticklist: a todo list with all / pending / completed views",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "todorc")]
    pub todorc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

/// Log level used when `RUST_LOG` is unset. Quiet flags win over verbose.
fn default_filter(verbose: u8, quiet: u8) -> &'static str {
    match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) => "warn",
        (0, 3..) => "trace",
        (0, 2) => "debug",
        (0, 1) => "info",
        (0, 0) => "warn",
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let level = default_filter(verbose, quiet);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.KEY=VALUE` (or `rc.KEY:VALUE`) overrides out of the
/// raw argument list.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        match s.strip_prefix("rc.").and_then(split_setting) {
            Some((key, value)) => {
                debug!(key, value, "captured positional rc override");
                overrides.push((format!("rc.{key}"), value.to_string()));
            }
            None => cleaned.push(arg),
        }
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let mut tokens = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string());

        let Some(first) = tokens.next() else {
            let view = cfg.default_view()?;
            debug!(view = %view, "no explicit command, listing default view");
            return Ok(Self {
                command: "list".to_string(),
                command_args: vec![view.to_string()],
            });
        };

        let known = crate::commands::known_command_names();
        let command = crate::commands::expand_command_abbrev(&first, &known)
            .ok_or_else(|| anyhow!("unknown or ambiguous command: {first}"))?;
        debug!(token = %first, expanded = %command, "resolved command token");

        Ok(Self {
            command: command.to_string(),
            command_args: tokens.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&os(&["ticklist", "rc.color=off", "list", "rc.default.view:pending"]))
            .expect("preprocess");
        assert_eq!(pre.cleaned_args, os(&["ticklist", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.default.view".to_string(), "pending".to_string()),
            ]
        );
    }

    #[test]
    fn settings_split_on_equals_before_colon() {
        assert_eq!(split_setting("data.location=/tmp/a:b"), Some(("data.location", "/tmp/a:b")));
        assert_eq!(split_setting("color:off"), Some(("color", "off")));
        assert_eq!(split_setting("color"), None);

        let kv: KeyVal = "default.view : pending".parse().expect("colon form");
        assert_eq!((kv.key.as_str(), kv.value.as_str()), ("default.view", "pending"));
        assert!("nothing".parse::<KeyVal>().is_err());
    }

    #[test]
    fn quiet_flags_override_verbose_ones() {
        assert_eq!(default_filter(0, 0), "warn");
        assert_eq!(default_filter(1, 0), "info");
        assert_eq!(default_filter(2, 0), "debug");
        assert_eq!(default_filter(5, 0), "trace");
        assert_eq!(default_filter(3, 1), "warn");
        assert_eq!(default_filter(3, 2), "error");
    }

    #[test]
    fn empty_invocation_lists_default_view() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("default.view".to_string(), "completed".to_string())]);
        let inv = Invocation::parse(&cfg, vec![]).expect("parse");
        assert_eq!(inv.command, "list");
        assert_eq!(inv.command_args, vec!["completed".to_string()]);
    }

    #[test]
    fn abbreviated_commands_expand() {
        let cfg = Config::default();
        let inv = Invocation::parse(&cfg, os(&["tog", "3"])).expect("parse");
        assert_eq!(inv.command, "toggle");
        assert_eq!(inv.command_args, vec!["3".to_string()]);

        assert!(Invocation::parse(&cfg, os(&["frobnicate"])).is_err());
    }
}
