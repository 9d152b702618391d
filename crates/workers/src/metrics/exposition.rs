use std::fmt::Write;

use super::dispatch_metrics::DispatchMetrics;

pub fn render_prometheus(m: &DispatchMetrics) -> String {
    let mut out = String::with_capacity(1024);
    write_prometheus(&mut out, m);
    out
}

/// Appends the dispatch families to an existing exposition body.
pub fn write_prometheus(out: &mut String, m: &DispatchMetrics) {
    write_counter(out, "riskwatch_alerts_dispatched_total", m.alerts_dispatched_val());
    write_counter(out, "riskwatch_deliveries_sent_total", m.deliveries_sent_val());
    write_counter(
        out,
        "riskwatch_deliveries_retry_scheduled_total",
        m.deliveries_retry_scheduled_val(),
    );
    write_counter(out, "riskwatch_deliveries_exhausted_total", m.deliveries_exhausted_val());
    write_counter(out, "riskwatch_send_timeouts_total", m.send_timeouts_val());
    write_counter(out, "riskwatch_retries_claimed_total", m.retries_claimed_val());
    write_counter(out, "riskwatch_escalations_total", m.escalations_val());
    write_counter(out, "riskwatch_deliveries_purged_total", m.deliveries_purged_val());

    let (sum, count) = m.send_latency_vals();
    write_summary(out, "riskwatch_send_latency_us", sum, count);
}

pub fn write_counter(out: &mut String, name: &str, val: u64) {
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {val}");
}

pub fn write_gauge(out: &mut String, name: &str, val: u64) {
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {val}");
}

pub fn write_summary(out: &mut String, name: &str, sum: u64, count: u64) {
    let _ = writeln!(out, "# TYPE {name} summary");
    let _ = writeln!(out, "{name}_sum {sum}");
    let _ = writeln!(out, "{name}_count {count}");
}
