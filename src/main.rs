use clap::Parser;
use nginx_status::adapters::{NginxApiClient, ZabbixSender};
use nginx_status::cli::{Check, Cli};
use nginx_status::config::AppConfig;
use nginx_status::error::{Result, StatusError};
use nginx_status::logging::{init_logging, init_logging_simple};
use nginx_status::services::{Listing, StatusAdapter, UpdateOutcome, UpdateSettings};
use std::sync::Arc;
use tracing::{debug, error};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            init_logging_simple();
            error!("{}", e);
            return Err(e);
        }
    };
    init_logging(&cfg.logging);
    debug!("Loaded configuration: {:?}", cfg);

    let source = match NginxApiClient::new(&cfg.nginx) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("{} failed: {}", cli.check, e);
            return fallback_output(cli.check, Listing::failed(e.to_string()));
        }
    };
    let sender = Arc::new(ZabbixSender::from_config(&cfg.zabbix));
    let adapter = StatusAdapter::new(source, sender, UpdateSettings::from_config(&cfg, cli.dry_run));

    run_check(&adapter, cli.check).await
}

/// Output of a check that could not start: discovery checks still print an
/// empty list, `update_items` prints nothing
fn fallback_output(check: Check, listing: Listing) -> Result<()> {
    if check.is_discovery() {
        print_listing(check, listing)
    } else {
        Ok(())
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let cfg = AppConfig::load_from(&cli.config, &cli.overrides())?;
    cfg.validate()
        .map_err(|errors| StatusError::Validation(errors.join("; ")))?;
    Ok(cfg)
}

/// Every check outcome exits 0; failures are only logged
async fn run_check(adapter: &StatusAdapter, check: Check) -> Result<()> {
    let listing = match check {
        Check::ListUpstreams => adapter.list_upstreams().await,
        Check::ListStreams => adapter.list_streams().await,
        Check::ShortListUpstreams => adapter.short_list_upstreams().await,
        Check::ShortListStreams => adapter.short_list_streams().await,
        Check::UpdateItems => {
            match adapter.update_items().await {
                UpdateOutcome::DryRun { payload } => println!("{}", payload),
                UpdateOutcome::Submitted { .. } | UpdateOutcome::Failed { .. } => {}
            }
            return Ok(());
        }
    };

    print_listing(check, listing)
}

fn print_listing(check: Check, listing: Listing) -> Result<()> {
    if let Some(reason) = &listing.failure {
        debug!("{} collapsed to an empty list: {}", check, reason);
    }
    println!("{}", listing.into_envelope().to_json()?);
    Ok(())
}
