use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(
        short,
        long,
        global = true,
        default_value = "info",
        value_parser = ["off", "error", "warn", "info", "debug", "trace"],
        help = "Logging verbosity. RUST_LOG takes precedence when set"
    )]
    pub log_level: String,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Create a series of synthetic pcap files. Each file starts where the previous one ends, and
    /// files are longer during quiet hours.
    CreatePcaps(CreatePcapsArgs),
    /// Show the duration scalar of the diurnal model across one day
    Profile {
        #[arg(short, long, default_value_t = false, help = "Use the weekend curve")]
        weekend: bool,
    },
}

#[derive(Debug, clap::Args, Clone)]
pub struct CreatePcapsArgs {
    #[arg(
        short,
        long,
        default_value = "synthetic.pcap",
        help = "Output file. \"{}\" is replaced by the file index, otherwise the index is appended to the file name"
    )]
    pub outfile: String,
    #[arg(short = 'n', long, default_value_t = 1, help = "Number of files to create")]
    pub file_count: usize,
    #[arg(long, default_value = "1min", help = "Minimum duration of a file, in human-friendly time such as \"1h 30min\"")]
    pub min_duration: String,
    #[arg(long, default_value = "1h", help = "Maximum duration of a file, in human-friendly time")]
    pub max_duration: String,
    #[arg(short, long, default_value_t = 10_000_000, help = "Maximum size of a file, in bytes")]
    pub max_size: u64,
    #[arg(long, default_value = None, help = "Number of internal hosts [default: 50]")]
    pub internal_hosts: Option<usize>,
    #[arg(long, default_value = None, help = "Number of external hosts [default: 200]")]
    pub external_hosts: Option<usize>,
    #[arg(short, long, help = "Seed for random number generation")]
    pub seed: Option<u64>,
    #[arg(short = 't', long, default_value = None, help = "Beginning time of the first file in RFC3339 style (\"2025-05-01 10:28:07\", local time) or a Unix timestamp. By default, use current time")]
    pub start_time: Option<String>,
    #[arg(short, long, default_value = None, help = "Path to a TOML configuration file")]
    pub config: Option<String>,
    #[arg(short, long, default_value = None, help = "Number of worker threads [default: half the available cores]")]
    pub jobs: Option<usize>,
    #[arg(
        long,
        default_value_t = false,
        help = "Write packets to disk as they are generated instead of assembling each file in memory"
    )]
    pub streaming: bool,
}
