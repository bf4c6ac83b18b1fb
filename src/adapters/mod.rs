pub mod nginx_api;
pub mod zabbix_sender;

pub use nginx_api::{NginxApiClient, StatusSource};
pub use zabbix_sender::{MetricSender, SenderSummary, ZabbixSender};

#[cfg(test)]
pub use nginx_api::MockStatusSource;
#[cfg(test)]
pub use zabbix_sender::MockMetricSender;
