use clap::Parser;
use std::path::PathBuf;

/// Play a slide story headless, logging each slide as it comes up
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Story content file (JSON); image paths resolve relative to its directory
    #[arg(value_name = "CONTENT")]
    pub content: PathBuf,

    /// Engine settings file (JSON); defaults apply when omitted
    #[arg(value_name = "SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Start muted regardless of the settings file
    #[arg(short = 'm', long = "muted")]
    pub muted: bool,

    /// Start at this section instead of the beginning
    #[arg(long = "section", value_name = "ID")]
    pub section: Option<usize>,
}
