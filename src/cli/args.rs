//! Command-line argument parsing for ragbuddy
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use crate::tools::FunctionSelection;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ragbuddy - Retrieval-augmented chat and tool dispatch for local models
#[derive(Parser, Debug)]
#[command(name = "ragbuddy")]
#[command(author = "Jerome (Kubashen) Naidoo")]
#[command(version)]
#[command(about = "Ingest documents and chat with them through a local Ollama model", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.ragbuddy/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -v (info), -vv (debug), -vvv (trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only, no progress)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a source into the embedding store
    Ingest {
        #[command(subcommand)]
        source: IngestSource,
    },

    /// Similarity search over the store
    Search {
        query: String,

        /// Number of results (default: retrieval.top_k)
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Ask a single question
    Ask {
        message: String,

        #[arg(long, default_value = "default")]
        session: String,

        /// Do not retrieve context from the store
        #[arg(long)]
        no_rag: bool,

        /// Offer a registered function to the model (repeatable)
        #[arg(long = "function", value_name = "NAME")]
        functions: Vec<String>,

        /// Offer every registered function
        #[arg(long)]
        all_functions: bool,
    },

    /// Interactive chat session
    Chat {
        #[arg(long, default_value = "default")]
        session: String,

        #[arg(long)]
        no_rag: bool,

        #[arg(long = "function", value_name = "NAME")]
        functions: Vec<String>,

        #[arg(long)]
        all_functions: bool,
    },

    /// Display current configuration
    Config,
}

#[derive(Subcommand, Debug)]
pub enum IngestSource {
    /// Plain UTF-8 text file
    Text {
        path: PathBuf,

        /// Add to the store instead of replacing it
        #[arg(long)]
        append: bool,
    },

    /// PDF, one document per page
    Pdf {
        path: PathBuf,

        /// Footer lines removed from the bottom of each page
        #[arg(long, default_value_t = 3)]
        trim_bottom_lines: usize,

        #[arg(long)]
        append: bool,
    },

    /// Pre-extracted text with form-feed page breaks (pdftotext output)
    Pages {
        path: PathBuf,

        #[arg(long, default_value_t = 3)]
        trim_bottom_lines: usize,

        #[arg(long)]
        append: bool,
    },

    /// JSON array of records, one document per record
    Records {
        path: PathBuf,

        /// Field identifying each record
        #[arg(long, default_value = "id")]
        key: String,

        /// Fields rendered into the document, in order
        #[arg(long, value_delimiter = ',', required = true)]
        fields: Vec<String>,

        /// Clear the store, then write one record at a time
        #[arg(long, conflicts_with = "append")]
        incremental: bool,

        #[arg(long)]
        append: bool,
    },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Args {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose == 0 {
            Verbosity::Normal
        } else {
            Verbosity::Verbose
        }
    }
}

impl Commands {
    /// Function selection for `ask` and `chat`; `--all-functions` wins
    pub fn function_selection(&self) -> FunctionSelection {
        match self {
            Commands::Ask {
                functions,
                all_functions,
                ..
            }
            | Commands::Chat {
                functions,
                all_functions,
                ..
            } => {
                if *all_functions {
                    FunctionSelection::All
                } else if functions.is_empty() {
                    FunctionSelection::None
                } else {
                    FunctionSelection::Named(functions.clone())
                }
            }
            _ => FunctionSelection::None,
        }
    }
}

impl Verbosity {
    /// Spinners are hidden in quiet mode
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Function call details and retrieval hits
    pub fn show_details(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}
