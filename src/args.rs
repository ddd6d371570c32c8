use std::path::PathBuf;

use clap::Parser;


/// Loads users and their group memberships from an LDAP directory and writes them as JSON lines.
#[derive(Clone, Debug, Eq, Hash, Ord, Parser, PartialEq, PartialOrd)]
pub struct Opts {
    /// TOML file with the connection options.
    #[arg(short = 'c', long)]
    pub config: PathBuf,

    /// Group whose members are loaded and tagged; can be given multiple times.
    #[arg(short = 'g', long = "group")]
    pub groups: Vec<String>,

    /// Additional attribute to include in each user's source attributes; can be given multiple times.
    #[arg(short = 'a', long = "attribute")]
    pub attributes: Vec<String>,

    /// Only load members of the given groups instead of all users.
    #[arg(long)]
    pub groups_only: bool,

    #[arg(short = 'v', long)]
    pub verbose: bool,
}
