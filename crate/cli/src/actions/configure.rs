use std::io::{self, BufRead};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use super::{
    CliContext,
    console::{confirm_from, prompt_from},
};
use crate::{
    cli_error,
    config::{
        ConfigFile, Service, allow_empty, validate_file_exists, validate_tcp_addr, validate_url,
    },
    error::result::KmsCliResult,
};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Kmip,
}

impl From<Protocol> for Service {
    fn from(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Http => Self::Http,
            Protocol::Kmip => Self::Kmip,
        }
    }
}

/// Configure CLI options.
///
/// Values not given as flags are asked interactively, with the current
/// value of the profile as default.
#[derive(Parser, Debug)]
#[command(args_conflicts_with_subcommands = true)]
pub struct ConfigureCommand {
    #[command(subcommand)]
    command: Option<ConfigureCommands>,

    /// Migrate to latest config schema, without changing the settings
    #[arg(long)]
    migrate_only: bool,

    /// Protocol to configure
    #[arg(long, value_enum, ignore_case = true)]
    protocol: Option<Protocol>,

    /// Endpoint: a URL for http, `host:port` for kmip
    #[arg(long = "endpoint", value_name = "ENDPOINT")]
    endpoint_address: Option<String>,

    /// CA file, may be empty
    #[arg(long = "ca", value_name = "FILE")]
    ca_file: Option<String>,

    /// Certificate file
    #[arg(long = "cert", value_name = "FILE")]
    cert_file: Option<String>,

    /// Private key file
    #[arg(long = "key", value_name = "FILE")]
    key_file: Option<String>,

    /// Save the configuration without asking
    #[arg(short, long)]
    yes: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigureCommands {
    SetProfile(SetProfileAction),
}

type Validator = Box<dyn Fn(&str) -> KmsCliResult<()>>;

/// Ask for a value until it is valid. An empty answer keeps `current`.
fn read_value(
    input: &mut impl BufRead,
    label: &str,
    current: &str,
    validate: &Validator,
) -> KmsCliResult<String> {
    loop {
        let value = prompt_from(input, label, current)?;
        match validate(&value) {
            Ok(()) => return Ok(value),
            Err(e) => eprintln!("Invalid value: {e}"),
        }
    }
}

impl ConfigureCommand {
    pub fn process(&self, ctx: &CliContext) -> KmsCliResult<()> {
        let mut config = ctx.config.clone();
        if let Some(ConfigureCommands::SetProfile(action)) = &self.command {
            return action.run(&mut config, &mut io::stdin().lock());
        }
        if self.migrate_only {
            config.write_to_file()?;
            println!("Migration completed");
            return Ok(());
        }
        let profile = ctx
            .profile
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| config.current_profile());
        let mut input = io::stdin().lock();
        self.configure(&mut config, &profile, &mut input)?;
        if self.yes || confirm_from(&mut input, "Save the new configuration ?")? {
            config.write_to_file()?;
            info!("configuration of profile {profile} saved");
        }
        Ok(())
    }

    fn protocol(&self, input: &mut impl BufRead) -> KmsCliResult<Protocol> {
        if let Some(protocol) = self.protocol {
            return Ok(protocol);
        }
        loop {
            let answer =
                prompt_from(input, "Select a protocol to configure (http, kmip)", "http")?;
            match Protocol::from_str(&answer, true) {
                Ok(protocol) => return Ok(protocol),
                Err(e) => eprintln!("Invalid value: {e}"),
            }
        }
    }

    /// Update the endpoint settings of `profile` from the flags and the
    /// answers read from `input`
    fn configure(
        &self,
        config: &mut ConfigFile,
        profile: &str,
        input: &mut impl BufRead,
    ) -> KmsCliResult<()> {
        let service = Service::from(self.protocol(input)?);
        let endpoint_validator: Validator = match service {
            Service::Http => Box::new(validate_url),
            Service::Kmip => Box::new(validate_tcp_addr),
        };
        let fields: [(&str, &str, Option<&String>, Validator); 4] = [
            (
                "Endpoint",
                "endpoint",
                self.endpoint_address.as_ref(),
                endpoint_validator,
            ),
            (
                "CA file",
                "ca",
                self.ca_file.as_ref(),
                Box::new(allow_empty(validate_file_exists)),
            ),
            (
                "Certificate file",
                "auth.cert",
                self.cert_file.as_ref(),
                Box::new(validate_file_exists),
            ),
            (
                "Private key file",
                "auth.key",
                self.key_file.as_ref(),
                Box::new(validate_file_exists),
            ),
        ];
        for (label, key, flag, validate) in fields {
            let key = format!("profiles.{profile}.{}.{key}", service.name());
            let value = if let Some(value) = flag {
                let value = value.trim().to_owned();
                validate(&value).map_err(|e| cli_error!("Invalid {label}: {e}"))?;
                value
            } else {
                let current = config.get_str(&key).unwrap_or_default();
                read_value(input, label, &current, &validate)?
            };
            config.set(&key, value);
        }
        Ok(())
    }
}

/// Switch the default profile
#[derive(Parser, Debug)]
pub struct SetProfileAction {
    /// Profile to use by default. Without it, the profiles are listed and
    /// the new one is asked for
    #[arg(value_name = "PROFILE")]
    profile_name: Option<String>,
}

impl SetProfileAction {
    fn run(&self, config: &mut ConfigFile, input: &mut impl BufRead) -> KmsCliResult<()> {
        let profile = if let Some(profile) = &self.profile_name {
            profile.clone()
        } else {
            let current = config.current_profile();
            for profile in config.profile_list() {
                let mark = if profile == current { "*" } else { " " };
                println!("{mark} {profile}");
            }
            prompt_from(input, "Select the new profile", &current)?
        };
        config.switch_profile(&profile)?;
        config.write_to_file()
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{ConfigureCommand, Protocol, SetProfileAction};
    use crate::config::ConfigFile;

    fn parse(args: &[&str]) -> ConfigureCommand {
        ConfigureCommand::try_parse_from(std::iter::once("configure").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_configure_from_flags() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("tls.crt");
        let key = dir.path().join("tls.key");
        std::fs::write(&cert, "cert").unwrap();
        std::fs::write(&key, "key").unwrap();
        let command = parse(&[
            "--protocol",
            "kmip",
            "--endpoint",
            "127.0.0.1:5696",
            "--ca",
            "",
            "--cert",
            cert.to_str().unwrap(),
            "--key",
            key.to_str().unwrap(),
            "--yes",
        ]);
        assert_eq!(command.protocol, Some(Protocol::Kmip));
        let mut config = ConfigFile::default();
        command
            .configure(&mut config, "prod", &mut &b""[..])
            .unwrap();
        assert_eq!(
            config.get_str("profiles.prod.kmip.endpoint").as_deref(),
            Some("127.0.0.1:5696")
        );
        assert_eq!(config.get_str("profiles.prod.kmip.ca").as_deref(), Some(""));
        assert_eq!(
            config.get_str("profiles.prod.kmip.auth.key"),
            Some(key.to_string_lossy().into_owned())
        );
    }

    #[test]
    fn test_configure_rejects_invalid_flag() {
        let command = parse(&["--protocol", "http", "--endpoint", "not a url"]);
        let err = command
            .configure(&mut ConfigFile::default(), "default", &mut &b""[..])
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid Endpoint"), "{err}");
    }

    #[test]
    fn test_interactive_answers_loop_until_valid() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("tls.crt");
        std::fs::write(&cert, "cert").unwrap();
        let cert = cert.to_string_lossy().into_owned();
        let answers = format!(
            "http\nnot a url\nhttps://eu-west-rbx.okms.ovh.net\n\n/does/not/exist\n{cert}\n{cert}\n"
        );
        let mut config = ConfigFile::default();
        parse(&[])
            .configure(&mut config, "default", &mut answers.as_bytes())
            .unwrap();
        assert_eq!(
            config.get_str("profiles.default.http.endpoint").as_deref(),
            Some("https://eu-west-rbx.okms.ovh.net")
        );
        assert_eq!(config.get_str("profiles.default.http.auth.cert"), Some(cert));
    }

    #[test]
    fn test_set_profile() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ConfigFile::from_yaml(
            "version: 1\nprofile: default\nprofiles:\n  default: {}\n  prod: {}\n",
        )
        .unwrap();
        config.set_path(dir.path().join("okms.yaml"));

        let action = SetProfileAction::try_parse_from(["set-profile", "prod"]).unwrap();
        action.run(&mut config, &mut &b""[..]).unwrap();
        assert_eq!(config.current_profile(), "prod");
        let written = std::fs::read_to_string(dir.path().join("okms.yaml")).unwrap();
        assert!(written.contains("profile: prod"), "{written}");

        let action = SetProfileAction::try_parse_from(["set-profile"]).unwrap();
        action.run(&mut config, &mut &b"default\n"[..]).unwrap();
        assert_eq!(config.current_profile(), "default");
        let action = SetProfileAction::try_parse_from(["set-profile", "staging"]).unwrap();
        assert!(action.run(&mut config, &mut &b""[..]).is_err());
    }

    #[test]
    fn test_migrate_only_conflicts_with_subcommand() {
        assert!(
            ConfigureCommand::try_parse_from(["configure", "--migrate-only", "set-profile", "p"])
                .is_err()
        );
    }
}
