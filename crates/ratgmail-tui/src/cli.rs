use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "ratgmail", version, about = "Terminal Gmail client")]
pub(crate) struct Cli {
    /// Read settings from this file instead of the default locations.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    /// Run against an in-memory mailbox; no Google account needed.
    #[arg(long)]
    pub(crate) demo: bool,
    /// Where downloaded attachments are written.
    #[arg(long)]
    pub(crate) downloads: Option<PathBuf>,
}
