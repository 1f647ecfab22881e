use clap::{CommandFactory, Parser, Subcommand};
use okms_logger::{debug_filter, log_init};
use tracing::debug;

use crate::{
    actions::{
        CliContext,
        configure::ConfigureCommand,
        console::{KMS_CLI_FORMAT, OutputFormat, Stdout},
        keys::KeysCommand,
        kmip::KmipCommand,
        markdown::MarkdownAction,
        secrets::SecretsCommand,
        version::VersionAction,
        x509::X509Command,
    },
    config::ConfigFile,
    error::result::KmsCliResult,
};

/// Command line interface of the OVHcloud KMS.
///
/// Manage service keys, secrets, X.509 certificates and KMIP objects of an
/// OKMS domain.
#[derive(Parser, Debug)]
#[command(name = "okms", version)]
pub struct Cli {
    /// Name of the profile to use
    #[arg(long, global = true, env = "KMS_PROFILE", value_name = "PROFILE")]
    pub profile: Option<String>,

    /// Path to a non default configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<String>,

    /// The formatting style of the command output
    #[arg(
        long,
        global = true,
        value_enum,
        env = KMS_CLI_FORMAT,
        default_value_t = OutputFormat::Text,
        ignore_case = true
    )]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: CliCommands,
}

#[derive(Subcommand, Debug)]
pub enum CliCommands {
    /// Configure CLI options
    #[command(alias = "config")]
    Configure(ConfigureCommand),
    /// Manage domain keys
    #[command(alias = "key")]
    Keys(KeysCommand),
    /// Manage secrets
    #[command(aliases = ["kv2", "secret"])]
    Secrets(SecretsCommand),
    /// Generate, and sign x509 certificates
    X509(X509Command),
    /// Manage kmip objects
    Kmip(KmipCommand),
    /// Print version information
    #[command(alias = "v")]
    Version(VersionAction),
    /// Generate the CLI documentation as markdown
    #[command(hide = true)]
    Markdown(MarkdownAction),
}

impl CliCommands {
    /// Whether `-d/--debug` was given to a command group
    #[must_use]
    pub fn debug(&self) -> bool {
        match self {
            Self::Keys(cmd) => cmd.rest.debug,
            Self::Secrets(cmd) => cmd.rest.debug,
            Self::X509(cmd) => cmd.rest.debug,
            Self::Kmip(cmd) => cmd.kmip.debug,
            Self::Configure(_) | Self::Version(_) | Self::Markdown(_) => false,
        }
    }
}

/// Parse the command line and run the selected command
pub async fn okms_main() -> KmsCliResult<()> {
    let cli = Cli::parse();
    let filter = cli.command.debug().then(debug_filter);
    log_init(filter.as_deref());
    debug!("command line: {cli:?}");

    match &cli.command {
        CliCommands::Markdown(action) => return action.process(&Cli::command()),
        CliCommands::Version(action) => return action.process(&Stdout::new(cli.output)),
        _ => {}
    }

    let ctx = CliContext {
        config: ConfigFile::load(cli.config.as_deref())?,
        profile: cli.profile.clone(),
        stdout: Stdout::new(cli.output),
    };
    match &cli.command {
        CliCommands::Configure(cmd) => cmd.process(&ctx),
        CliCommands::Keys(cmd) => cmd.process(&ctx).await,
        CliCommands::Secrets(cmd) => cmd.process(&ctx).await,
        CliCommands::X509(cmd) => cmd.process(&ctx).await,
        CliCommands::Kmip(cmd) => cmd.process(&ctx),
        CliCommands::Version(_) | CliCommands::Markdown(_) => Ok(()),
    }
}
