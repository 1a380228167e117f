use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use vml_libvirt_module::{LibvirtModule, LibvirtModuleConfig};
use vmlink_rs::api::agent_module::ControlMessage;
use vmlink_rs::module::Module;

#[derive(Parser, Debug, Clone)]
struct LibvirtModuleArgs {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config_file: PathBuf,

    #[command(subcommand)]
    command: Option<ModuleCommand>,
}

#[derive(Subcommand, Debug, Clone)]
enum ModuleCommand {
    /// Poll once and print the status payload
    Status,

    /// Print the control advertisements
    Controls,

    /// Send a single command payload to a control, e.g. `control libvirt_web01 ON`
    Control { control: String, payload: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = LibvirtModuleArgs::parse();

    let config_str = std::fs::read_to_string(&args.config_file)
        .with_context(|| format!("failed to read config file {:?}", args.config_file))?;
    let config: LibvirtModuleConfig =
        toml::from_str(&config_str).context("failed to parse config file")?;

    let module =
        LibvirtModule::connect(&config.libvirt).context("failed to open libvirt connection")?;

    match args.command {
        None => run_poll_loop(&module, &config).await,
        Some(ModuleCommand::Status) => {
            println!("{}", serde_json::to_string_pretty(&module.poll().await)?);
            Ok(())
        }
        Some(ModuleCommand::Controls) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&module.exposed_controls().await)?
            );
            Ok(())
        }
        Some(ModuleCommand::Control { control, payload }) => {
            let msg = ControlMessage {
                topic: vec![module.name().to_string(), control],
                payload,
            };
            module.handle_control(&msg).await;
            Ok(())
        }
    }
}

async fn run_poll_loop<M: Module>(module: &M, config: &LibvirtModuleConfig) -> Result<()> {
    info!(
        module = module.name(),
        module_id = %config.base.module_id,
        interval = ?config.base.poll_interval,
        "starting poll loop"
    );

    loop {
        let status = module.poll().await;
        let payload = serde_json::to_string(&status)?;
        info!(status = %payload, "domain status");
        tokio::time::sleep(config.base.poll_interval).await;
    }
}
