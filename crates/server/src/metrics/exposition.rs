use riskwatch_workers::metrics::dispatch_metrics::DispatchMetrics;
use riskwatch_workers::metrics::exposition::{write_counter, write_gauge, write_prometheus, write_summary};

use super::server_metrics::ServerMetrics;

/// Point-in-time values that are not counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gauges {
    pub rate_limit_buckets: u64,
    pub channels_unreachable: u64,
}

pub fn render_prometheus(m: &ServerMetrics, dispatch: &DispatchMetrics, gauges: Gauges) -> String {
    let mut out = String::with_capacity(2048);

    write_counter(&mut out, "riskwatch_server_rest_requests_total", m.rest_requests_total());
    write_counter(&mut out, "riskwatch_server_rest_errors_total", m.rest_errors_total());
    write_counter(&mut out, "riskwatch_server_requests_admitted_total", m.requests_admitted_total());
    write_counter(
        &mut out,
        "riskwatch_server_requests_rate_limited_total",
        m.requests_rate_limited_total(),
    );
    write_counter(&mut out, "riskwatch_server_buckets_evicted_total", m.buckets_evicted_total());
    write_counter(&mut out, "riskwatch_server_alerts_created_total", m.alerts_created_total());
    write_counter(
        &mut out,
        "riskwatch_server_alerts_acknowledged_total",
        m.alerts_acknowledged_total(),
    );
    write_counter(&mut out, "riskwatch_server_alerts_resolved_total", m.alerts_resolved_total());

    let (sum, count) = m.rest_latency_vals();
    write_summary(&mut out, "riskwatch_server_rest_latency_us", sum, count);

    write_gauge(&mut out, "riskwatch_server_rate_limit_buckets", gauges.rate_limit_buckets);
    write_gauge(&mut out, "riskwatch_channels_unreachable", gauges.channels_unreachable);

    write_prometheus(&mut out, dispatch);
    out
}
