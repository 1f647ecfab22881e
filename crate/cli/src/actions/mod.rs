use std::{io::Read, time::Duration};

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use okms_client::{DEFAULT_RETRY, KmipClient, KmsRestClient};
use tracing::debug;

use self::console::Stdout;
use crate::{
    cli_error,
    config::{ConfigFile, EndpointArgs, Service, resolve_endpoint},
    error::result::KmsCliResult,
};

pub mod args;
pub mod configure;
pub mod console;
pub mod keys;
pub mod kmip;
pub mod markdown;
pub mod secrets;
pub mod version;
pub mod x509;

/// What every command gets to work with: the loaded configuration, the
/// profile selected on the command line and the output renderer
pub struct CliContext {
    pub config: ConfigFile,
    pub profile: Option<String>,
    pub stdout: Stdout,
}

/// Flags of the commands using the REST API
#[derive(Args, Clone, Debug)]
pub struct RestArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Activate debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Maximum number of retries for failed requests
    #[arg(long, global = true, default_value_t = DEFAULT_RETRY)]
    pub retry: u32,

    /// Timeout of each request, in seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

impl RestArgs {
    pub fn client(&self, ctx: &CliContext) -> KmsCliResult<KmsRestClient> {
        let endpoint =
            resolve_endpoint(&ctx.config, ctx.profile.as_deref(), Service::Http, &self.endpoint)?;
        debug!("REST endpoint: {}", endpoint.endpoint);
        let config = endpoint.rest_config(self.retry, self.timeout.map(Duration::from_secs))?;
        Ok(KmsRestClient::instantiate(&config)?)
    }
}

/// Flags of the commands using the KMIP endpoint
#[derive(Args, Clone, Debug)]
pub struct KmipArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Activate debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Timeout of each request, in seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

impl KmipArgs {
    pub fn client(&self, ctx: &CliContext) -> KmsCliResult<KmipClient> {
        let endpoint =
            resolve_endpoint(&ctx.config, ctx.profile.as_deref(), Service::Kmip, &self.endpoint)?;
        debug!("KMIP endpoint: {}", endpoint.endpoint);
        let config = endpoint.kmip_config(self.timeout.map(Duration::from_secs))?;
        Ok(KmipClient::instantiate(&config)?)
    }
}

/// A progress bar on stderr counting the bytes of an input, or a spinner
/// when its size is unknown
pub(crate) fn progress_bar(size: Option<u64>, message: &'static str) -> KmsCliResult<ProgressBar> {
    let (bar, template) = match size {
        Some(size) => (
            ProgressBar::new(size),
            "{msg} {percent:>3}% [{wide_bar}] ({bytes}/{total_bytes}, {bytes_per_sec})",
        ),
        None => (
            ProgressBar::new_spinner(),
            "{msg} {spinner} ({bytes}, {bytes_per_sec})",
        ),
    };
    let style = ProgressStyle::with_template(template)
        .map_err(|e| cli_error!("Invalid progress bar template: {e}"))?;
    Ok(bar.with_style(style).with_message(message))
}

/// Wrap `reader` with a progress bar when `show` is set
pub(crate) fn with_progress(
    reader: Box<dyn Read>,
    size: Option<u64>,
    message: &'static str,
    show: bool,
) -> KmsCliResult<(Box<dyn Read>, Option<ProgressBar>)> {
    if !show {
        return Ok((reader, None));
    }
    let bar = progress_bar(size, message)?;
    Ok((Box::new(bar.wrap_read(reader)), Some(bar)))
}
