//! Command line. Only recognized flags reach clap; anything else is ignored so hosts
//! can pass extra arguments without breaking startup.

use clap::Parser;

#[derive(Parser, Debug, Default, PartialEq, Eq)]
#[command(name = "insta-dm-mcp")]
#[command(about = "Instagram direct-message tools over the Model Context Protocol (stdio)", long_about = None)]
#[command(version)]
pub struct CliArgs {
    /// Instagram username (or set INSTAGRAM_USERNAME).
    #[arg(long)]
    pub username: Option<String>,

    /// Instagram password (or set INSTAGRAM_PASSWORD).
    #[arg(long)]
    pub password: Option<String>,

    /// Directory for session records (overrides INSTA_MCP_SESSION_DIR).
    #[arg(long)]
    pub session_dir: Option<String>,
}

/// Flags that take a value.
const VALUE_FLAGS: &[&str] = &["--username", "--password", "--session-dir"];

/// Flags without a value.
const SWITCHES: &[&str] = &["-h", "--help", "-V", "--version"];

impl CliArgs {
    /// Parse `args` (program name first), ignoring unknown flags and positionals.
    /// `--help`/`--version` and malformed known flags exit through clap.
    pub fn parse_known<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self::try_parse_from(known_args(args)).unwrap_or_else(|e| e.exit())
    }
}

/// Keep the program name plus recognized flags (and their values).
pub fn known_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut iter = args.into_iter();
    let mut kept: Vec<String> = iter.next().into_iter().collect();
    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            kept.push(arg);
            if let Some(value) = iter.next() {
                kept.push(value);
            }
        } else if arg
            .split_once('=')
            .is_some_and(|(flag, _)| VALUE_FLAGS.contains(&flag))
            || SWITCHES.contains(&arg.as_str())
        {
            kept.push(arg);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_known_args_drops_unknown_flags() {
        let kept = known_args(argv(&[
            "insta-dm-mcp",
            "--transport",
            "stdio",
            "--username",
            "alice",
            "--verbose",
            "--password=pw",
        ]));
        assert_eq!(
            kept,
            argv(&["insta-dm-mcp", "--username", "alice", "--password=pw"])
        );
    }

    #[test]
    fn test_parse_known() {
        let args = CliArgs::parse_known(argv(&[
            "insta-dm-mcp",
            "--extra",
            "--username",
            "alice",
            "--session-dir",
            "/var/lib/insta",
        ]));
        assert_eq!(args.username.as_deref(), Some("alice"));
        assert_eq!(args.password, None);
        assert_eq!(args.session_dir.as_deref(), Some("/var/lib/insta"));
    }

    #[test]
    fn test_no_args() {
        assert_eq!(CliArgs::parse_known(argv(&["insta-dm-mcp"])), CliArgs::default());
    }
}
