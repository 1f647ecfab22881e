use std::{fs, net::ToSocketAddrs, path::PathBuf};

use url::Url;

use crate::{cli_bail, cli_ensure, cli_error, error::result::KmsCliResult};

/// Expand a leading `~` or `~/` to the user's home directory.
/// `~user` forms are left untouched.
pub fn expand_tilde(input: &str) -> KmsCliResult<String> {
    if input != "~" && !input.starts_with("~/") {
        return Ok(input.to_owned());
    }
    #[allow(deprecated)]
    let home: PathBuf = std::env::home_dir()
        .ok_or_else(|| cli_error!("failed to expand tilde in {input:?}: no home directory"))?;
    let rest = input[1..].trim_start_matches('/');
    let expanded = if rest.is_empty() { home } else { home.join(rest) };
    Ok(expanded.to_string_lossy().into_owned())
}

pub fn validate_url(value: &str) -> KmsCliResult<()> {
    let url = Url::parse(value)?;
    cli_ensure!(
        url.host_str().is_some_and(|h| !h.is_empty()),
        "URL {value:?} has no host"
    );
    Ok(())
}

pub fn validate_file_exists(value: &str) -> KmsCliResult<()> {
    let path = expand_tilde(value)?;
    let metadata = fs::metadata(&path).map_err(|e| cli_error!("{path}: {e}"))?;
    if metadata.is_dir() {
        cli_bail!("Must be a file but is a directory");
    }
    Ok(())
}

/// `host:port` where the port is a valid TCP port
pub fn validate_tcp_addr(value: &str) -> KmsCliResult<()> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| cli_error!("{value:?}: missing port in address"))?;
    cli_ensure!(!host.is_empty(), "{value:?}: missing host in address");
    port.parse::<u16>()
        .map_err(|_e| cli_error!("{value:?}: invalid port {port:?}"))?;
    // resolution is only attempted to report obviously wrong host names
    if let Err(e) = (host.trim_start_matches('[').trim_end_matches(']'), 0_u16).to_socket_addrs() {
        cli_bail!("{value:?}: {e}");
    }
    Ok(())
}

/// Accept an empty value, otherwise defer to `validator`
pub fn allow_empty(
    validator: fn(&str) -> KmsCliResult<()>,
) -> impl Fn(&str) -> KmsCliResult<()> {
    move |value| {
        if value.is_empty() {
            Ok(())
        } else {
            validator(value)
        }
    }
}
