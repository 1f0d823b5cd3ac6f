use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "medmatch")]
#[command(about = "medmatch - match patients and researchers with experts and clinical trials")]
#[command(version)]
#[command(after_help = "\x1b[1;36mQuick Start:\x1b[0m
  medmatch seed data/seed.json                     Load sample researchers and trials
  medmatch search experts \"breast cancer\"          Search the local store
  medmatch search experts \"glioma\" --external      Include PubMed, ORCID, ClinicalTrials.gov, ...
  medmatch search trials \"parkinson\" -e            Trials from the local store and the registry
  medmatch search publications \"dcis\"              Recent PubMed publications

\x1b[1;36mAdmin Desk:\x1b[0m
  medmatch contact 1001 --name \"Jane Doe\" --email jane@example.com
  medmatch admin list
  medmatch admin update req_1_1001 resolved

\x1b[1;36mConfiguration:\x1b[0m
  medmatch config show                             Effective configuration
  medmatch config path                             Where the config file lives")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, env = "MEDMATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search experts, trials or collaborators
    #[command(after_help = "\x1b[1;33mExamples:\x1b[0m
  medmatch search experts \"adhd\"
  medmatch search experts \"adhd\" --external --timeout-ms 5000
  medmatch search trials \"breast cancer\" -e --output json
  medmatch search collaborators \"amsterdam\"")]
    Search {
        #[command(subcommand)]
        target: SearchTarget,
    },

    /// Ask to meet a researcher (routed to an admin when they are not on the platform)
    Contact(ContactArgs),

    /// Review and manage admin requests
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },

    /// ORCID profile tools
    Orcid {
        #[command(subcommand)]
        action: OrcidAction,
    },

    /// Assistant: condition analysis, trial summaries, research suggestions
    Ai {
        #[command(subcommand)]
        action: AiAction,
    },

    /// Load researcher and trial rows from a JSON file into the store
    Seed {
        /// JSON file with "researchers" and "trials" arrays
        file: PathBuf,
    },

    /// List the external sources this build and configuration will query
    Sources,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum SearchTarget {
    /// Experts: local researchers plus publication, identity and trial registries
    Experts(SearchArgs),
    /// Clinical trials: local trials plus the trial registry
    Trials(SearchArgs),
    /// Collaborators: local researchers only
    Collaborators(SearchArgs),
    /// Publications from PubMed, or a built-in list when none are found
    Publications(PublicationArgs),
}

#[derive(Args, Clone)]
pub struct PublicationArgs {
    /// Search term
    pub query: String,

    /// Maximum number of publications
    #[arg(short, long, default_value_t = 5)]
    pub limit: usize,
}

#[derive(Args, Clone)]
pub struct SearchArgs {
    /// Search term (omit to list everything in the local store)
    #[arg(default_value = "")]
    pub query: String,

    /// Also query external sources
    #[arg(short, long)]
    pub external: bool,

    /// Per-call deadline for external sources, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Per-source result limit (applies to every external source)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Return a placeholder trial when a trial search finds nothing
    #[arg(long)]
    pub fallback: bool,
}

#[derive(Args, Clone)]
pub struct ContactArgs {
    /// Researcher id from a search result
    pub researcher_id: String,

    /// Patient name
    #[arg(long)]
    pub name: String,

    /// Patient email
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub phone: Option<String>,

    /// Preferred date (free text, e.g. 2024-02-15)
    #[arg(long)]
    pub date: Option<String>,

    /// Preferred time (free text, e.g. morning)
    #[arg(long)]
    pub time: Option<String>,

    #[arg(long, default_value = "video")]
    pub meeting_type: String,

    #[arg(short, long)]
    pub message: Option<String>,

    #[arg(long, default_value = "normal")]
    pub urgency: String,
}

#[derive(Subcommand)]
pub enum AdminAction {
    /// List requests, newest first
    List,

    /// Change a request's status (pending_admin_review, in_progress, resolved)
    Update { id: String, status: String },

    /// Ask an admin to contact an external expert
    Request {
        #[arg(long)]
        patient: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        expert_name: String,
        #[arg(long)]
        expert_id: String,
        #[arg(short, long)]
        message: Option<String>,
        #[arg(long, default_value = "normal")]
        urgency: String,
    },

    /// Flag an external expert whose contact details are missing
    Flag {
        #[arg(long)]
        name: String,
        #[arg(long)]
        id: String,
        /// Where the expert was found (e.g. PubMed)
        #[arg(long, default_value = "External")]
        source: String,
        #[arg(long)]
        specialty: Option<String>,
        #[arg(long)]
        institution: Option<String>,
    },

    /// Build a platform-join invitation for an external expert
    Nudge {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        institution: String,
        /// Source tag (pubmed, orcid, clinicaltrials, scholar, researchgate)
        #[arg(long, default_value = "pubmed")]
        source: String,
    },
}

#[derive(Subcommand)]
pub enum OrcidAction {
    /// Fetch a profile and its recent publications
    Sync {
        /// ORCID iD, e.g. 0000-0002-1825-0097
        orcid_id: String,
    },
}

#[derive(Subcommand)]
pub enum AiAction {
    /// Extract the primary condition, or answer a question
    Analyze { text: String },

    /// Patient-friendly trial summary
    Summary {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Collaboration ideas, or an answer to a research question
    Suggest {
        /// Specialty (repeatable)
        #[arg(long = "specialty")]
        specialties: Vec<String>,
        /// Research interest (repeatable)
        #[arg(long = "interest")]
        interests: Vec<String>,
        #[arg(short, long)]
        question: Option<String>,
    },
}

#[derive(Subcommand, Clone, Copy)]
pub enum ConfigAction {
    /// Effective configuration (file + environment), credentials masked
    Show,
    /// Path of the config file in use
    Path,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Pretty,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_parsing() {
        let cli = Cli::parse_from(["medmatch", "search", "experts", "adhd", "-e", "--limit", "2"]);
        let Commands::Search {
            target: SearchTarget::Experts(args),
        } = cli.command
        else {
            panic!("expected search experts");
        };
        assert_eq!(args.query, "adhd");
        assert!(args.external);
        assert_eq!(args.limit, Some(2));
        assert_eq!(cli.output, OutputFormat::Pretty);
    }

    #[test]
    fn test_publication_parsing() {
        let cli = Cli::parse_from(["medmatch", "search", "publications", "glioma"]);
        let Commands::Search {
            target: SearchTarget::Publications(args),
        } = cli.command
        else {
            panic!("expected search publications");
        };
        assert_eq!(args.query, "glioma");
        assert_eq!(args.limit, 5);
        assert!(Cli::try_parse_from(["medmatch", "search", "publications"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["medmatch", "admin", "list", "--output", "json", "-vv"]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.verbose, 2);
    }
}
