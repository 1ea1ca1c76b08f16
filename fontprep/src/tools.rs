//! The external converters fontprep drives.
//!
//! Every tool follows the same contract: it is handed paths on the command
//! line, writes its result to disk and reports success with exit status 0.

use std::{ffi::OsStr, fmt, process::Command, str::FromStr};

use log::debug;

use crate::{
    config::{ToolConfig, ToolsConfig},
    error::Error,
};

// exit status timeout(1) reports when the budget runs out
const TIMED_OUT: i32 = 124;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Autohint,
    LookupRepair,
    Woff2,
    Eot,
    SvgCleanup,
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolKind::Autohint => "autohint",
            ToolKind::LookupRepair => "lookup repair",
            ToolKind::Woff2 => "woff2 compressor",
            ToolKind::Eot => "eot converter",
            ToolKind::SvgCleanup => "svg cleanup",
        };
        f.write_str(name)
    }
}

/// Hinting strategies understood by [`ToolKind::Autohint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintMethod {
    Gdi,
    DirectWrite,
    Grayscale,
    NoHint,
}

impl FromStr for HintMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gdi" => Ok(HintMethod::Gdi),
            "directwrite" => Ok(HintMethod::DirectWrite),
            "grayscale" => Ok(HintMethod::Grayscale),
            "nohint" => Ok(HintMethod::NoHint),
            _ => Err(Error::UnknownHintMethod(s.to_string())),
        }
    }
}

impl HintMethod {
    /// The autohinter flags for this method.
    ///
    /// Fonts without a lowercase 'o' are assumed to be symbol fonts, which
    /// the Latin tuned stem detection gets wrong.
    pub fn flags(&self, has_lowercase_o: bool) -> Vec<&'static str> {
        let mut flags = vec![match self {
            HintMethod::Gdi => "--strong-stem-width=G",
            HintMethod::DirectWrite => "--strong-stem-width=D",
            HintMethod::Grayscale => "--strong-stem-width=g",
            HintMethod::NoHint => "--dehint",
        }];
        if !has_lowercase_o {
            flags.push("--symbol");
        }
        flags
    }
}

/// Resolved tool invocations, shared read-only by every entity of a store.
#[derive(Debug, Clone)]
pub struct Toolbox {
    tools: ToolsConfig,
}

impl Toolbox {
    pub fn new(tools: &ToolsConfig) -> Self {
        Toolbox {
            tools: tools.clone(),
        }
    }

    fn tool(&self, kind: ToolKind) -> &ToolConfig {
        match kind {
            ToolKind::Autohint => &self.tools.autohint,
            ToolKind::LookupRepair => &self.tools.lookup_repair,
            ToolKind::Woff2 => &self.tools.woff2,
            ToolKind::Eot => &self.tools.eot,
            ToolKind::SvgCleanup => &self.tools.svg_cleanup,
        }
    }

    fn command(&self, kind: ToolKind) -> Command {
        let tool = self.tool(kind);
        let mut cmd = match &self.tools.timeout {
            Some(timeout) => {
                let mut cmd = Command::new(&timeout.program);
                cmd.arg(&timeout.budget).arg(&tool.program);
                cmd
            }
            None => Command::new(&tool.program),
        };
        cmd.args(&tool.args).envs(&tool.env);
        cmd
    }

    /// Run `kind` with `args` after its configured leading flags.
    ///
    /// Blocks until the tool exits. Anything but a clean exit is an error;
    /// nothing is retried.
    pub fn run<I, S>(&self, kind: ToolKind, args: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.command(kind);
        cmd.args(args);
        debug!("Running {kind}: {cmd:?}");

        let output = cmd
            .output()
            .map_err(|source| Error::ToolSpawn { tool: kind, source })?;
        if output.status.success() {
            return Ok(());
        }
        let status = output.status.code();
        debug!(
            "{kind} failed with {status:?}: '{}'",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        match status {
            Some(TIMED_OUT) if self.tools.timeout.is_some() => {
                Err(Error::ToolTimedOut { tool: kind })
            }
            // None means killed by a signal
            _ => Err(Error::ToolFailed { tool: kind, status }),
        }
    }
}
