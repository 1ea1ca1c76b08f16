//! Command line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fontprep::{Error, ExportFormat, Fix, FontId, HintMethod, ProcessRequest};

/// Prepare fonts for the web.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(version, about)]
pub struct Args {
    /// A YAML file of storage and tool settings, defaults are used without one
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Store a font, printing its id and full name
    Create {
        /// The font file to upload
        file: PathBuf,
    },
    /// Fix, hint, subset and export a stored font
    Process {
        /// Id printed by create
        #[arg(long)]
        id: String,

        /// names, metrics[:microsoft|google|adobe|webfont], glyphs, references or lookups
        #[arg(long = "fix")]
        fixes: Vec<String>,

        /// gdi, directwrite, grayscale or nohint
        #[arg(long)]
        hinting: Option<String>,

        /// Unicode ranges to keep, e.g. 20-7F; the upper bound is exclusive
        #[arg(long = "range")]
        ranges: Vec<String>,

        /// ttf, otf, woff, woff2, eot or svg
        #[arg(long = "output", required = true)]
        outputs: Vec<String>,

        /// Where exports are written, as <fontname>.<ext>
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Delete a stored font for good
    Delete { id: String },
}

/// Parse an id given on the command line.
pub fn font_id(raw: &str) -> Result<FontId, Error> {
    raw.parse()
}

/// Validate the options of [`Command::Process`].
pub fn process_request(
    fixes: &[String],
    hinting: Option<&str>,
    ranges: &[String],
    outputs: &[String],
    out_dir: PathBuf,
) -> Result<ProcessRequest, Error> {
    Ok(ProcessRequest {
        fixes: fixes
            .iter()
            .map(|fix| fix.parse::<Fix>())
            .collect::<Result<_, _>>()?,
        hinting: hinting.map(str::parse::<HintMethod>).transpose()?,
        ranges: ranges.to_vec(),
        outputs: outputs
            .iter()
            .map(|format| format.parse::<ExportFormat>())
            .collect::<Result<_, _>>()?,
        out_dir,
    })
}
