mod config;
mod http_client;
mod json;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use soapbind_async::{SoapClient, load_contract};
use soapbind_core::ClientError;
use soapbind_wsdl::ContractDescriptor;
use tracing::{error, info, instrument};

use config::{Args, Command, client_config, init_logging};
use http_client::ReqwestHttpClient;

#[tokio::main]
#[instrument(name = "main", level = "info", skip_all)]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let http_client = ReqwestHttpClient::new()?;

    match args.command {
        Command::Describe { wsdl } => {
            let contract = read_contract(&http_client, &wsdl).await?;
            describe(&contract);
        }
        Command::Call {
            wsdl,
            operation,
            args,
            header,
            endpoint,
            username,
            password,
        } => {
            let contract = Arc::new(read_contract(&http_client, &wsdl).await?);
            let arguments = json::parse(&args).context("Invalid --args JSON")?;
            let header = header
                .as_deref()
                .map(json::parse)
                .transpose()
                .context("Invalid --header JSON")?;

            let client = SoapClient::new(
                contract,
                client_config(endpoint, username, password),
                http_client,
            );
            info!(operation = %operation, "calling operation");

            match client.invoke(&operation, &arguments, header.as_ref()).await {
                Ok(result) => {
                    println!("{}", json::to_json(&result.result)?);
                    if let Some(header) = result.header {
                        eprintln!("header: {}", json::to_json(&header)?);
                    }
                }
                Err(ClientError::Fault(fault)) => {
                    error!(code = %fault.code, "operation returned a fault");
                    eprintln!("SOAP fault {}: {}", fault.code, fault.string);
                    if let Some(detail) = &fault.detail {
                        eprintln!("detail: {}", json::to_json(detail)?);
                    }
                    std::process::exit(2);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

async fn read_contract(
    http_client: &ReqwestHttpClient,
    location: &str,
) -> anyhow::Result<ContractDescriptor> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return load_contract(http_client, location).await;
    }

    let source = tokio::fs::read_to_string(location)
        .await
        .with_context(|| format!("Failed to read {location}"))?;
    soapbind_wsdl::parse(source).with_context(|| format!("Failed to parse {location}"))
}

fn describe(contract: &ContractDescriptor) {
    for service in contract.services() {
        println!("service {}", service.name);
        for (name, port) in &service.ports {
            println!(
                "  port {name} ({:?}) at {}",
                port.binding.soap_version,
                port.address.as_deref().unwrap_or("<no address>")
            );
            for operation in port.operations() {
                let shape = if operation.is_one_way() { "one-way" } else { "request-response" };
                println!(
                    "    {} [{:?}, {shape}] action={}",
                    operation.name,
                    operation.rule.style,
                    operation.soap_action.as_deref().unwrap_or("-")
                );
            }
        }
    }
}
