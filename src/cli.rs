use clap::Parser;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Path of the configuration file, created with defaults if missing
    #[clap(long, short)]
    pub config: camino::Utf8PathBuf,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Run the frame until interrupted
    Run,

    /// Load and validate the configuration, then exit
    VerifyConfig,

    /// Render a single frame of one mode to a PNG file
    Render {
        #[clap(long)]
        mode: crate::modes::ModeName,

        #[clap(long)]
        output: camino::Utf8PathBuf,
    },
}
