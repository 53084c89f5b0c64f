use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::info;

/// Installs the global Prometheus recorder and serves it on `[::]:{port}/metrics`.
///
/// Must be called from within a tokio runtime, which drives the HTTP listener. When
/// `partition_id` is set it is attached to every metric as the `partition` label so that workers
/// splitting one run can be told apart.
pub fn init_metrics(port: u16, partition_id: Option<u16>) -> Result<(), BuildError> {
    let address = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port);
    let mut builder = PrometheusBuilder::new().with_http_listener(address);

    if let Some(partition_id) = partition_id {
        builder = builder.add_global_label("partition", partition_id.to_string());
    }

    builder.install()?;
    info!(%address, "prometheus exporter listening");

    Ok(())
}
