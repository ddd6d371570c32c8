mod args;
mod builder;
mod config;
mod connector;
mod directory;
mod encoding;
mod error;
mod formatter;
mod identity;
mod ldap;
#[cfg(test)]
mod ldif;
mod paging;
#[cfg(test)]
mod testing;
mod user;


use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crate::args::Opts;
use crate::config::ConnectionOptions;
use crate::connector::LdapDirectoryConnector;
use crate::error::Result;


fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}


async fn run(opts: Opts) -> Result<()> {
    let options = ConnectionOptions::load(&opts.config)?;
    debug!(connector = LdapDirectoryConnector::NAME, options = ?options, "initialized");

    let password = options.resolve_password()?;
    options.report_unused_values();

    let mut connector = LdapDirectoryConnector::connect(options, &password).await?;
    let users = connector.load_users_and_groups(
        &opts.groups,
        &opts.attributes,
        !opts.groups_only,
    ).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for user in users {
        serde_json::to_writer(&mut out, user)?;
        writeln!(out)?;
    }
    out.flush()?;

    connector.close().await
}


#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let opts = Opts::parse();
    init_logging(opts.verbose);

    match run(opts).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "loading users failed");
            ExitCode::FAILURE
        },
    }
}
