use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;

use crate::config::parse_recursion_depth;
use crate::core::{Engine, ExtractionRequest};

#[derive(Parser)]
#[command(name = "llextract")]
#[command(about = "Extract selected functions from textual LLVM IR")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print extra info messages to track the extraction process
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    Init {
        /// Target file (defaults to ./llextract.toml)
        #[arg(short, long, default_value = "llextract.toml")]
        path: PathBuf,
    },

    /// Extract functions from a `.ll` file
    Extract {
        /// Input `.ll` file
        #[arg(long)]
        input: PathBuf,

        /// Output `.ll` file (defaults to the configured file name next to the input)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Function to extract by exact name; repeat for several functions
        #[arg(short = 'f', long = "function")]
        functions: Vec<String>,

        /// Extract functions whose names match this regex; repeatable
        #[arg(short = 'p', long = "function-pattern")]
        function_patterns: Vec<String>,

        /// Extract functions containing a code line that matches this regex; repeatable
        #[arg(short = 'l', long = "line-pattern")]
        line_patterns: Vec<String>,

        /// Ignore functions whose names match this regex; repeatable
        #[arg(short = 'i', long = "ignore-function-pattern")]
        ignore_patterns: Vec<String>,

        /// Recursively extract called functions up to this depth (0 disables)
        #[arg(short = 'r', long = "recursion-depth", allow_hyphen_values = true)]
        recursion_depth: Option<String>,

        /// Fail instead of writing a preamble-only file when nothing matches
        #[arg(long)]
        fail_on_empty: bool,

        /// Also write a JSON report of the extraction
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run the jobs defined in the configuration file
    Run {
        /// Only run the job with this name
        #[arg(long)]
        job: Option<String>,
    },

    /// Show the call layers reachable from the given functions
    Graph {
        /// Input `.ll` file
        #[arg(long)]
        input: PathBuf,

        /// Starting function; repeatable
        #[arg(short = 'f', long = "function", required = true)]
        functions: Vec<String>,

        /// Number of call hops to follow
        #[arg(short = 'r', long = "depth", default_value_t = 1)]
        depth: usize,
    },
}

impl Cli {
    pub fn execute(self, mut engine: Engine) -> Result<()> {
        match self.command {
            Commands::Init { path } => engine.init(&path),
            Commands::Extract {
                input,
                output,
                functions,
                function_patterns,
                line_patterns,
                ignore_patterns,
                recursion_depth,
                fail_on_empty,
                report,
            } => {
                let request = ExtractionRequest {
                    input,
                    output,
                    function_names: functions,
                    function_patterns,
                    line_patterns,
                    ignore_patterns,
                    recursion_depth: recursion_depth
                        .as_deref()
                        .map(parse_recursion_depth)
                        .transpose()?,
                    fail_on_empty: fail_on_empty.then_some(true),
                    report,
                };
                let outcome = engine.extract(&request)?;
                println!(
                    "Extracted {} function(s) into {}",
                    outcome.extracted_count,
                    outcome.output.display()
                );
                if self.verbose {
                    let stats = &outcome.stats;
                    println!(
                        "  parsed {} | selected {} | added by expansion {} | external callees {}",
                        stats.functions_parsed, stats.selected, stats.expanded, stats.external
                    );
                }
                Ok(())
            }
            Commands::Run { job } => {
                for outcome in engine.run_jobs(job.as_deref())? {
                    println!(
                        "Extracted {} function(s) into {}",
                        outcome.extracted_count,
                        outcome.output.display()
                    );
                }
                Ok(())
            }
            Commands::Graph {
                input,
                functions,
                depth,
            } => {
                print!("{}", engine.graph(&input, &functions, depth)?);
                Ok(())
            }
        }
    }
}
