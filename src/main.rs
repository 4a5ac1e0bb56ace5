use std::process;
use std::sync::Arc;

use clap::Parser;
use pingora::services::listening::Service;
use pingora_core::server::{configuration::Opt, Server};
use pingora_proxy::{http_proxy_service_with_name, HttpProxy};
use sentry::IntoDsn;

use mcp_bridge::{
    cli::Cli,
    config::{Config, BRIDGE_ENDPOINT},
    logging,
    mcp::{Dispatcher, InMemorySessionStore},
    proxy::upstream::HttpUpstream,
    service::BridgeProxyService,
};

fn main() {
    let cli = Cli::parse();
    let config = match Config::load_with_overrides(&cli, |key| std::env::var(key).ok()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = logging::init(config.log.as_ref()) {
        eprintln!("Failed to initialize logging: {e}");
        process::exit(1);
    }

    let bridge_cfg = Arc::new(config.bridge.clone());
    let upstream = match HttpUpstream::new(&bridge_cfg.upstream) {
        Ok(upstream) => upstream,
        Err(e) => {
            log::error!("Failed to create upstream client: {e}");
            process::exit(1);
        }
    };
    log::info!("Forwarding bridge calls to {}", upstream.url());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(upstream),
        Arc::new(InMemorySessionStore::new()),
        bridge_cfg.session_key.clone(),
    ));

    let mut bridge_server = Server::new_with_opt_and_conf(Option::<Opt>::None, config.pingora);

    let mut http_service: Service<HttpProxy<BridgeProxyService>> = http_proxy_service_with_name(
        &bridge_server.configuration,
        BridgeProxyService::new(bridge_cfg.clone(), dispatcher),
        "mcp_bridge",
    );

    log::info!("Adding listener...");
    let listen = bridge_cfg.listen.to_string();
    http_service.add_tcp(&listen);

    add_optional_services(&mut bridge_server, config.sentry.as_ref(), config.prometheus.as_ref());

    log::info!("Bootstrapping...");
    bridge_server.bootstrap();
    log::info!("Bootstrapped. Adding Services...");
    bridge_server.add_service(http_service);

    log::info!("Bridge listening on {listen}, POST {BRIDGE_ENDPOINT}");
    bridge_server.run_forever();
}

fn add_optional_services(
    server: &mut Server,
    sentry_cfg: Option<&mcp_bridge::config::Sentry>,
    prometheus_cfg: Option<&mcp_bridge::config::Prometheus>,
) {
    if let Some(sentry_cfg) = sentry_cfg {
        match sentry_cfg.dsn.clone().into_dsn() {
            Ok(dsn) => {
                log::info!("Adding Sentry config...");
                server.sentry = Some(sentry::ClientOptions {
                    dsn,
                    ..Default::default()
                });
            }
            Err(e) => log::error!("Invalid Sentry DSN, error reporting disabled: {e}"),
        }
    }

    if let Some(prometheus_cfg) = prometheus_cfg {
        log::info!("Adding Prometheus Service...");
        let mut prometheus_service_http = Service::prometheus_http_service();
        prometheus_service_http.add_tcp(&prometheus_cfg.address.to_string());
        server.add_service(prometheus_service_http);
    }
}
