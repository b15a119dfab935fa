//! Configuration view and validation commands: `prodyo config`.

use std::path::Path;

use anyhow::Result;
use prodyo::config::ProdyoToml;

use super::super::ConfigCommands;

fn print_values(config: &ProdyoToml) {
    println!("[server]");
    println!("  host = \"{}\"", config.server.host);
    println!("  port = {}", config.server.port);
    println!("  cors_permissive = {}", config.server.cors_permissive);
    println!();
    println!("[database]");
    println!("  path = \"{}\"", config.database.path.display());
    println!();
    println!("[auth]");
    println!("  session_ttl_hours = {}", config.auth.session_ttl_hours);
    println!("  bcrypt_cost = {}", config.auth.bcrypt_cost);
    println!();
    println!("[logging]");
    println!("  format = \"{}\"", config.logging.format);
    println!("  filter = \"{}\"", config.logging.filter);
    println!();
}

pub fn cmd_config(config_path: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Prodyo Configuration");
            println!("====================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No {} found; using defaults.", config_path.display());
            }
            println!();

            println!("Effective values (with PRODYO_* overrides):");
            let config = super::load_config(config_path)?;
            print_values(&config);

            if !config_path.exists() {
                println!("Run 'prodyo config init' to create a config file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No {} found. Using defaults (valid).", config_path.display());
                return Ok(());
            }

            let config = ProdyoToml::load(config_path)?;
            let warnings = config.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("{} already exists", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            ProdyoToml::default().save(config_path)?;

            println!("Created {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] host, port, cors_permissive");
            println!("  - [database] path");
            println!("  - [auth] session_ttl_hours, bcrypt_cost");
            println!("  - [logging] format, filter");
            println!();
        }
    }

    Ok(())
}
