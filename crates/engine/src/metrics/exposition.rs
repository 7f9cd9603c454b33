use std::sync::Arc;

use super::engine_metrics::EngineMetrics;

pub fn render_prometheus(m: &Arc<EngineMetrics>) -> String {
    let mut out = String::with_capacity(1024);

    write_counter(&mut out, "domainwatch_runs_completed_total", m.runs_completed_val());
    write_counter(&mut out, "domainwatch_runs_failed_total", m.runs_failed_val());
    write_counter(&mut out, "domainwatch_patterns_evaluated_total", m.patterns_evaluated_val());
    write_counter(&mut out, "domainwatch_patterns_rejected_total", m.patterns_rejected_val());
    write_counter(&mut out, "domainwatch_rows_scanned_total", m.rows_scanned_val());
    write_counter(&mut out, "domainwatch_evaluation_timeouts_total", m.evaluation_timeouts_val());
    write_counter(&mut out, "domainwatch_alerts_inserted_total", m.alerts_inserted_val());
    write_counter(&mut out, "domainwatch_duplicates_ignored_total", m.duplicates_ignored_val());
    write_counter(&mut out, "domainwatch_notifications_sent_total", m.notifications_sent_val());
    write_counter(&mut out, "domainwatch_notifications_failed_total", m.notifications_failed_val());

    let (sum, count) = m.run_latency_vals();
    write_summary(&mut out, "domainwatch_run_latency_us", sum, count);

    out
}

fn write_counter(out: &mut String, name: &str, val: u64) {
    use std::fmt::Write;
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {val}");
}

fn write_summary(out: &mut String, name: &str, sum: u64, count: u64) {
    use std::fmt::Write;
    let _ = writeln!(out, "# TYPE {name} summary");
    let _ = writeln!(out, "{name}_sum {sum}");
    let _ = writeln!(out, "{name}_count {count}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposition_includes_all_counters() {
        let m = EngineMetrics::new();
        m.inc_runs_completed();
        m.add_alerts_inserted(5);
        let text = render_prometheus(&m);
        assert!(text.contains("domainwatch_runs_completed_total 1"));
        assert!(text.contains("domainwatch_alerts_inserted_total 5"));
        assert!(text.contains("domainwatch_run_latency_us_count 0"));
    }
}
