use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pillbox", about = "Index and query debugger health pill logs")]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log directory to discover runs under (overrides the config file)
    #[arg(long, global = true)]
    pub logdir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write the two-run debugger fixture into a log directory
    Seed {
        /// Target log directory
        logdir: PathBuf,
    },
    /// List runs
    Runs,
    /// List the tags of a run
    Tags {
        #[arg(long)]
        run: String,
    },
    /// Print the values of one tag
    Lookup {
        #[arg(long)]
        run: String,
        #[arg(long)]
        tag: String,
        /// First step to include
        #[arg(long)]
        start: Option<i64>,
        /// Last step to include
        #[arg(long)]
        end: Option<i64>,
    },
    /// Print health pills of debugger nodes
    HealthPills {
        #[arg(long)]
        run: String,
        /// Node (op) names; repeat for several
        #[arg(long = "node", required = true)]
        nodes: Vec<String>,
        /// Only this step
        #[arg(long)]
        step: Option<i64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lookup_with_range() {
        let cli = Cli::try_parse_from([
            "pillbox", "--logdir", "/tmp/logs", "lookup", "--run", ".", "--tag", "layers/Matmul",
            "--start", "2", "--end", "7",
        ])
        .unwrap();

        assert_eq!(cli.logdir, Some(PathBuf::from("/tmp/logs")));
        match cli.command {
            Command::Lookup { run, tag, start, end } => {
                assert_eq!(run, ".");
                assert_eq!(tag, "layers/Matmul");
                assert_eq!((start, end), (Some(2), Some(7)));
            }
            _ => panic!("expected lookup"),
        }
    }

    #[test]
    fn test_parse_repeated_nodes() {
        let cli = Cli::try_parse_from([
            "pillbox",
            "health-pills",
            "--run",
            ".",
            "--node",
            "layers/Matmul",
            "--node",
            "logits/Add",
        ])
        .unwrap();

        match cli.command {
            Command::HealthPills { nodes, step, .. } => {
                assert_eq!(nodes, vec!["layers/Matmul", "logits/Add"]);
                assert_eq!(step, None);
            }
            _ => panic!("expected health-pills"),
        }
    }

    #[test]
    fn test_health_pills_requires_node() {
        assert!(Cli::try_parse_from(["pillbox", "health-pills", "--run", "."]).is_err());
    }
}
