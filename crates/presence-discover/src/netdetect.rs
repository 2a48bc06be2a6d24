//! Local network parameter detection.
//!
//! Finds the interface and IPv4 subnet behind the default route using
//! `ip route` and `ip addr`. Best effort: anything that goes wrong falls
//! back to configured defaults.

use std::net::Ipv4Addr;
use std::time::Duration;

use ipnet::Ipv4Net;

use crate::config::PresenceConfig;
use crate::scanner::ToolCommand;

/// Interface and subnet the active scans should target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub interface: String,
    pub range: Ipv4Net,
}

/// The interesting parts of `ip route show default`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DefaultRoute {
    pub gateway: Option<Ipv4Addr>,
    pub interface: Option<String>,
}

/// Detect network parameters. Config overrides win; never fails.
pub async fn detect_network(config: &PresenceConfig) -> NetworkParams {
    let range_override = config.network_range_override().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring network_range override");
        None
    });

    let route = if config.interface.is_some() && range_override.is_some() {
        DefaultRoute::default()
    } else {
        query_default_route(config).await
    };

    let interface = config
        .interface
        .clone()
        .or_else(|| route.interface.clone())
        .unwrap_or_else(|| config.fallback_interface.clone());

    let range = match range_override {
        Some(range) => range,
        None => match query_interface_network(config, &interface).await {
            Some(net) => net,
            None => route
                .gateway
                .and_then(|gw| Ipv4Net::new(gw, 24).ok())
                .map(|net| net.trunc())
                .unwrap_or_else(|| config.fallback_network()),
        },
    };

    tracing::info!(interface = %interface, range = %range, "Network parameters detected");

    NetworkParams { interface, range }
}

async fn query_default_route(config: &PresenceConfig) -> DefaultRoute {
    let cmd = ip_command(config).args(["route", "show", "default"]);
    match cmd.run().await {
        Ok(stdout) => parse_default_route(&stdout),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read default route");
            DefaultRoute::default()
        }
    }
}

async fn query_interface_network(config: &PresenceConfig, interface: &str) -> Option<Ipv4Net> {
    let cmd = ip_command(config).args(["-o", "-4", "addr", "show", "dev", interface]);
    match cmd.run().await {
        Ok(stdout) => parse_interface_network(&stdout),
        Err(e) => {
            tracing::debug!(interface = %interface, error = %e, "Could not read interface address");
            None
        }
    }
}

fn ip_command(config: &PresenceConfig) -> ToolCommand {
    ToolCommand::new(
        &config.ip_path,
        Duration::from_secs(config.detect_timeout_secs),
    )
}

/// Parse `default via 192.168.1.1 dev wlan0 proto dhcp metric 600`.
pub fn parse_default_route(stdout: &str) -> DefaultRoute {
    for line in stdout.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first() != Some(&"default") {
            continue;
        }

        let value_after = |key: &str| {
            tokens
                .windows(2)
                .find(|w| w[0] == key)
                .map(|w| w[1])
        };

        let route = DefaultRoute {
            gateway: value_after("via").and_then(|gw| gw.parse().ok()),
            interface: value_after("dev").map(String::from),
        };
        if route.interface.is_some() {
            return route;
        }
    }

    DefaultRoute::default()
}

/// Parse the first `inet a.b.c.d/nn` from `ip -o -4 addr show` into its network.
pub fn parse_interface_network(stdout: &str) -> Option<Ipv4Net> {
    stdout.lines().find_map(|line| {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        tokens
            .windows(2)
            .find(|w| w[0] == "inet")
            .and_then(|w| w[1].parse::<Ipv4Net>().ok())
            .map(|net| net.trunc())
    })
}
