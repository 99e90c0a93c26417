//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: drive runs until steering converges
//! - once: a single run
//! - init: write a starter config and seed file
//! - list / show: inspect the run ledger

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use refinr::config::Config;
use refinr::domain::ArtifactKind;

/// Refinr - iterative generate/evaluate/refine pipeline
#[derive(Parser, Debug)]
#[command(name = "refinr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the refinement loop until next steps run out
    Run {
        #[command(flatten)]
        args: RunArgs,

        /// Stop after this many runs
        #[arg(long)]
        max_runs: Option<u32>,

        /// Milliseconds to wait between runs
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Continue from the steering of the newest sealed run in the ledger
        #[arg(long)]
        resume: bool,
    },

    /// Execute a single run and print its receipt
    Once {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Write a starter config and seed file in the current directory
    Init {
        /// Artifact kind (code, document)
        #[arg(short, long, default_value = "code")]
        kind: ArtifactKind,

        /// Seed file to create if missing
        #[arg(short, long, default_value = "seed.txt")]
        seed: PathBuf,

        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// List recorded runs
    List,

    /// Print the receipt of a recorded run
    Show {
        /// Run ID
        id: String,
    },
}

/// Overrides for the pipeline section of the config
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Goal text
    #[arg(short, long)]
    pub goal: Option<String>,

    /// Seed example file
    #[arg(short, long)]
    pub seed: Option<PathBuf>,

    /// Iterations per run
    #[arg(short = 'n', long)]
    pub iterations: Option<u32>,

    /// Initial focus area
    #[arg(short, long)]
    pub focus_area: Option<String>,
}

impl RunArgs {
    /// Apply the overrides that were given
    pub fn apply(&self, config: &mut Config) {
        if let Some(goal) = &self.goal {
            config.pipeline.goal = Some(goal.clone());
        }
        if let Some(seed) = &self.seed {
            config.pipeline.seed_path = Some(seed.clone());
        }
        if let Some(iterations) = self.iterations {
            config.pipeline.iterations = iterations;
        }
        if let Some(focus) = &self.focus_area {
            config.pipeline.focus_area = Some(focus.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["refinr"]).is_err());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["refinr", "-v", "list"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["refinr", "-c", "/path/to/refinr.yml", "list"]).unwrap();
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/refinr.yml")));
    }

    #[test]
    fn test_run_command_with_overrides() {
        let cli = Cli::try_parse_from([
            "refinr",
            "run",
            "--goal",
            "reverse a string",
            "-n",
            "3",
            "--max-runs",
            "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                args,
                max_runs,
                delay_ms,
                resume,
            } => {
                assert_eq!(args.goal.as_deref(), Some("reverse a string"));
                assert_eq!(args.iterations, Some(3));
                assert_eq!(max_runs, Some(2));
                assert!(delay_ms.is_none());
                assert!(!resume);
            }
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_run_resume_flag() {
        let cli = Cli::try_parse_from(["refinr", "run", "--resume"]).unwrap();
        match cli.command {
            Commands::Run { resume, .. } => assert!(resume),
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_once_command() {
        let cli = Cli::try_parse_from(["refinr", "once", "-s", "example.py"]).unwrap();
        match cli.command {
            Commands::Once { args } => {
                assert_eq!(args.seed, Some(PathBuf::from("example.py")));
                assert!(args.goal.is_none());
            }
            _ => panic!("Expected once command"),
        }
    }

    #[test]
    fn test_init_defaults() {
        let cli = Cli::try_parse_from(["refinr", "init"]).unwrap();
        match cli.command {
            Commands::Init { kind, seed, force } => {
                assert_eq!(kind, ArtifactKind::Code);
                assert_eq!(seed, PathBuf::from("seed.txt"));
                assert!(!force);
            }
            _ => panic!("Expected init command"),
        }
    }

    #[test]
    fn test_init_document_kind() {
        let cli = Cli::try_parse_from(["refinr", "init", "--kind", "document"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Init {
                kind: ArtifactKind::Document,
                ..
            }
        ));
    }

    #[test]
    fn test_show_command() {
        let cli = Cli::try_parse_from(["refinr", "show", "1738300800123-a1b2"]).unwrap();
        match cli.command {
            Commands::Show { id } => assert_eq!(id, "1738300800123-a1b2"),
            _ => panic!("Expected show command"),
        }
    }

    #[test]
    fn test_run_args_apply() {
        let mut config = Config::default();
        let args = RunArgs {
            goal: Some("write docs".to_string()),
            iterations: Some(0),
            ..Default::default()
        };
        args.apply(&mut config);
        assert_eq!(config.pipeline.goal.as_deref(), Some("write docs"));
        assert_eq!(config.pipeline.iterations, 0);
        assert!(config.pipeline.seed_path.is_none());
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
