//! Zabbix trapper push ("sender data" request), backed by the `zbx_sender`
//! client.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use zbx_sender::{Response, SendValue, Sender};

use crate::config::ZabbixConfig;
use crate::domain::MetricSet;
use crate::error::{Result, StatusError};

/// Push side of the monitoring system. The binary uses [`ZabbixSender`];
/// tests substitute a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricSender: Send + Sync {
    /// Submit every item of `items` under the monitored host `host`
    async fn send(&self, host: &str, items: &MetricSet) -> Result<SenderSummary>;
}

/// Counters reported back by the trapper
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SenderSummary {
    pub processed: u64,
    pub failed: u64,
    pub total: u64,
    pub seconds_spent: f64,
}

impl From<&Response> for SenderSummary {
    fn from(response: &Response) -> Self {
        let count = |n: Option<i32>| n.and_then(|n| u64::try_from(n).ok()).unwrap_or(0);
        Self {
            processed: count(response.processed_cnt()),
            failed: count(response.failed_cnt()),
            total: count(response.total_cnt()),
            seconds_spent: response.seconds_spent().map(f64::from).unwrap_or(0.0),
        }
    }
}

pub struct ZabbixSender {
    client: Sender,
    address: String,
    timeout: Duration,
}

impl ZabbixSender {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        let host = host.into();
        Self {
            address: format!("{}:{}", host, port),
            client: Sender::new(host, port),
            timeout,
        }
    }

    pub fn from_config(cfg: &ZabbixConfig) -> Self {
        Self::new(cfg.host.clone(), cfg.port, cfg.timeout())
    }
}

#[async_trait]
impl MetricSender for ZabbixSender {
    async fn send(&self, host: &str, items: &MetricSet) -> Result<SenderSummary> {
        let values: Vec<SendValue> = items
            .iter()
            .map(|(key, value)| SendValue::from((host, key, value.to_string().as_str())))
            .collect();

        let response = tokio::time::timeout(self.timeout, self.client.send_async(values))
            .await
            .map_err(|_| StatusError::SenderTimeout {
                elapsed_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| StatusError::Sender(format!("push to {} failed: {}", self.address, e)))?;

        if !response.success() {
            return Err(StatusError::Sender(format!(
                "trapper {} rejected the request: {:?}",
                self.address, response
            )));
        }

        let summary = SenderSummary::from(&response);
        if summary.failed > 0 {
            warn!(
                "Zabbix rejected {} of {} items for host {} (unknown keys or wrong types)",
                summary.failed, summary.total, host
            );
        }
        debug!(
            "Sent {} items to {} (processed={}, failed={})",
            items.len(),
            self.address,
            summary.processed,
            summary.failed
        );

        Ok(summary)
    }
}
