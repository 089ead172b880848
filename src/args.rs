use clap::{Parser, Subcommand, ValueEnum};
use moodle_courses::Mode;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "moodle-courses")]
#[command(about = "Discovers enrolled Moodle courses and keeps a local course list")]
#[command(version)]
pub struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the stored course list
    #[arg(short, long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and pull the course list from the dashboard
    Extract(ExtractArgs),

    /// Show the stored course list
    List,

    /// Add a course by hand
    Add {
        /// Display name
        name: String,

        /// Course page URL
        url: String,
    },

    /// Remove a course by URL or name
    Remove {
        /// URL or name of the course
        key: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
    /// Academic year of the portal instance (e.g. 2024-25)
    #[arg(short, long)]
    pub year: Option<String>,

    /// How to combine extracted courses with the stored list
    #[arg(short, long, value_enum, default_value_t = ModeArg::Merge)]
    pub mode: ModeArg,

    /// Portal username
    #[arg(short, long, env = "MOODLE_USERNAME")]
    pub username: String,

    /// Portal password
    #[arg(short, long, env = "MOODLE_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Allow a replace that would leave the list empty
    #[arg(long)]
    pub force: bool,

    /// Show the result without saving it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Merge,
    Replace,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Merge => Mode::Merge,
            ModeArg::Replace => Mode::Replace,
        }
    }
}
