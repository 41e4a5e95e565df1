use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "configctl", version, about = "Inspect and edit tether settings")]
pub struct Cli {
    /// Keep settings even when RESET_ALL is set in the environment
    #[arg(long, global = true)]
    pub no_reset: bool,

    /// More log output (-v debug, -vv trace); overrides RUST_LOG
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Use `<DIR>/system` and `<DIR>/user` instead of the platform directories
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Print every field with its value and writability
    Show {
        /// Print the values as TOML instead of a table
        #[arg(long)]
        toml: bool,
        /// Evaluate control states as if the core ran as a client
        #[arg(long)]
        client: bool,
    },
    /// Change one field (by lock name, e.g. `port` or `tlsKeyLength`)
    Set { field: String, value: String },
    /// Show the scope selector, or switch the active scope
    Scope {
        #[arg(value_enum)]
        scope: Option<ScopeArg>,
    },
    /// Create the TLS certificate if none exists yet
    EnsureCert,
    /// Replace the TLS certificate; every peer must trust the new fingerprint
    RegenCert {
        /// Required: regeneration breaks existing trust
        #[arg(long)]
        yes: bool,
        /// Key length of the new certificate (2048, 3072 or 4096); defaults
        /// to the length of the certificate being replaced
        #[arg(long, value_name = "BITS")]
        key_length: Option<u32>,
    },
    /// Path, key length and fingerprint of the current certificate
    CertInfo,
}

#[derive(Copy, Clone, ValueEnum)]
pub enum ScopeArg {
    System,
    User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["configctl", "set", "port", "24801", "--no-reset", "-vv"])
            .expect("parse");
        assert!(cli.no_reset);
        assert_eq!(cli.verbose, 2);
        match cli.cmd {
            Cmd::Set { field, value } => {
                assert_eq!(field, "port");
                assert_eq!(value, "24801");
            }
            _ => panic!("expected set"),
        }
    }

    #[test]
    fn regen_requires_explicit_flag_to_be_parsed() {
        let cli = Cli::try_parse_from(["configctl", "regen-cert"]).expect("parse");
        assert!(matches!(
            cli.cmd,
            Cmd::RegenCert {
                yes: false,
                key_length: None
            }
        ));
        let cli = Cli::try_parse_from(["configctl", "regen-cert", "--yes", "--key-length", "4096"])
            .expect("parse");
        assert!(matches!(
            cli.cmd,
            Cmd::RegenCert {
                yes: true,
                key_length: Some(4096)
            }
        ));
        let cli = Cli::try_parse_from(["configctl", "scope", "system"]).expect("parse");
        assert!(matches!(
            cli.cmd,
            Cmd::Scope {
                scope: Some(ScopeArg::System)
            }
        ));
    }
}
