//! `flowcast config`: print the effective configuration.

use flowcast_infra::config::render_config;
use flowcast_types::config::ServerConfig;

/// Print `config` as TOML, or as pretty JSON when `json` is set.
pub fn show_config(config: &ServerConfig, json: bool) -> anyhow::Result<()> {
    println!("{}", format_config(config, json)?);
    Ok(())
}

fn format_config(config: &ServerConfig, json: bool) -> anyhow::Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(config)?)
    } else {
        Ok(render_config(config)?)
    }
}
