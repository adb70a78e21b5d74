use tracing::trace;

// Counters emitted as trace events so the EnvFilter can route them;
// the prometheus endpoint in main renders the installed recorder.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "catforge.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn inc_jobs(outcome: &'static str) {
    trace!(
        target = "catforge.metrics",
        outcome = outcome,
        "jobs_total_inc"
    );
}

pub fn batch_elapsed(batch: usize, elapsed_ms: u128) {
    trace!(
        target = "catforge.metrics",
        batch = batch,
        elapsed_ms = elapsed_ms as u64,
        "batch_elapsed"
    );
}
