use clap::Parser;

/// Development-mode runner: transpiles TypeScript/JavaScript on demand,
/// supervises the given command as a child process, and restarts it when
/// source files change.
///
/// Mirrors the `shim`'s flat `#[derive(Parser)]` `Args` shape — one
/// command, global-ish flags, and a trailing positional passthrough —
/// without that binary's Go-interop `--help`/`--version` workaround, since
/// this tool has no second runtime to dispatch into.
#[derive(Parser, Debug, Clone, PartialEq)]
#[clap(author, about = "Run a TypeScript/JavaScript command in dev mode", long_about = None)]
pub struct Args {
    /// Read stdin for control commands (`rs` = restart).
    #[clap(long = "commands", short = 'c')]
    pub commands: bool,

    /// Restart the child when source files change.
    #[clap(long = "watch", short = 'w', default_value_t = true, action = clap::ArgAction::Set)]
    pub watch: bool,

    /// After the child exits, do not shut down; wait for the next restart
    /// trigger instead.
    #[clap(long = "supervise", short = 's')]
    pub supervise: bool,

    /// Use the per-file transpiler backend instead of the group-build
    /// backend.
    #[clap(long = "swc")]
    pub swc: bool,

    /// The user's command and its arguments. Unknown flags pass through.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let args = Args::try_parse_from(["tsdev", "node", "index.ts"]).unwrap();
        assert!(!args.commands);
        assert!(args.watch);
        assert!(!args.supervise);
        assert!(!args.swc);
        assert_eq!(args.command, vec!["node".to_string(), "index.ts".to_string()]);
    }

    #[test]
    fn flags_and_passthrough_args_parse_together() {
        let args = Args::try_parse_from([
            "tsdev", "-c", "-s", "--swc", "--", "node", "--inspect", "index.ts",
        ])
        .unwrap();
        assert!(args.commands);
        assert!(args.supervise);
        assert!(args.swc);
        assert_eq!(
            args.command,
            vec!["node".to_string(), "--inspect".to_string(), "index.ts".to_string()]
        );
    }

    #[test]
    fn watch_can_be_explicitly_disabled() {
        let args = Args::try_parse_from(["tsdev", "--watch=false", "node", "index.ts"]).unwrap();
        assert!(!args.watch);
    }
}
