//! HTTP server command: `prodyo serve`.

use anyhow::Result;
use prodyo::config::ProdyoToml;
use prodyo::server::{self, ServerConfig};

use super::super::ServeArgs;

pub async fn cmd_serve(config: &ProdyoToml, args: &ServeArgs) -> Result<()> {
    let mut server_config = ServerConfig::from_toml(config);
    if let Some(host) = &args.host {
        server_config.host = host.clone();
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }
    if let Some(db_path) = &args.db_path {
        server_config.db_path = db_path.clone();
    }
    if args.dev {
        server_config.cors_permissive = true;
    }

    for warning in config.validate() {
        tracing::warn!(%warning, "configuration warning");
    }

    server::start_server(server_config).await
}
