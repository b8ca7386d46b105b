use clap::Parser;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

const AFTER_HELP: &str = "\
Tokens ending in .pdb, .cif or .ent name the model; .ccp4, .map or .sit name
the map. Any other existing file is read as a TOML parameter file, and
key=value tokens set single parameters (e.g. resolution=3.5,
annealing.number_of_steps=200).

Example: cryo_fit user.pdb user.map";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "cryo_fit - Fit an atomic model into a cryo-EM density map by simulated annealing.",
    help_template = HELP_TEMPLATE,
    after_help = AFTER_HELP,
)]
pub struct Cli {
    /// Model file, map file, parameter files and key=value parameters, in any order
    #[arg(value_name = "TOKENS")]
    pub tokens: Vec<String>,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Skip the required-input checks; a missing map is then synthesized
    /// from the model
    #[arg(long)]
    pub prevalidated: bool,

    /// Abort the annealing run after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_and_flags_parse_in_any_order() {
        let cli = Cli::try_parse_from([
            "cryo_fit",
            "user.pdb",
            "-vv",
            "user.map",
            "resolution=4",
            "--timeout",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.tokens, ["user.pdb", "user.map", "resolution=4"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.timeout, Some(30.0));
        assert!(!cli.prevalidated);
    }

    #[test]
    fn no_tokens_is_accepted_by_the_parser() {
        let cli = Cli::try_parse_from(["cryo_fit"]).unwrap();
        assert!(cli.tokens.is_empty());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["cryo_fit", "-q", "-v"]).is_err());
    }
}
