use clap::{Parser, Subcommand};
use soapbind_core::{BasicAuth, ClientConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, registry::Registry};

/// WSDL-driven SOAP client
#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Verbose logging (can be repeated for more verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase logging verbosity")]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the services, ports and operations of a contract
    Describe {
        #[arg(short, long, help = "Path or http(s) URL of the WSDL document")]
        wsdl: String,
    },

    /// Call one operation and print its result as JSON
    Call {
        #[arg(short, long, help = "Path or http(s) URL of the WSDL document")]
        wsdl: String,

        #[arg(
            short,
            long,
            help = "Operation name, or service/port/operation when the name is ambiguous"
        )]
        operation: String,

        #[arg(short, long, default_value = "{}", help = "Arguments as a JSON object")]
        args: String,

        #[arg(long, help = "SOAP header values as a JSON object")]
        header: Option<String>,

        #[arg(short, long, help = "Endpoint overriding the port address")]
        endpoint: Option<String>,

        #[arg(short, long, help = "Username for HTTP basic authentication")]
        username: Option<String>,

        #[arg(
            short = 'P',
            long,
            default_value = "",
            help = "Password for HTTP basic authentication"
        )]
        password: String,
    },
}

/// Initialize logging to stderr; stdout carries the command output
pub fn init_logging(verbose_level: u8) -> anyhow::Result<()> {
    let log_level = match verbose_level {
        0 => "warn",
        1 => "info,reqwest=warn,hyper=warn",
        2 => "debug,reqwest=info,hyper=info",
        _ => "trace",
    };

    let env_filter = EnvFilter::new(log_level);

    let subscriber = Registry::default().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_line_number(true)
            .compact(),
    );

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

pub fn client_config(
    endpoint: Option<String>,
    username: Option<String>,
    password: String,
) -> ClientConfig {
    ClientConfig {
        endpoint,
        basic_auth: username.map(|username| BasicAuth::new(username, password)),
        ..ClientConfig::default()
    }
}
