use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Process-wide counters exposed on `/metrics` and `/metrics/prometheus`.
#[derive(Clone)]
pub struct Metrics {
    pub requests_total: Arc<AtomicU64>,
    pub registrations: Arc<AtomicU64>,
    pub logins: Arc<AtomicU64>,
    pub login_failures: Arc<AtomicU64>,
    pub orders_placed: Arc<AtomicU64>,
    pub reports_filed: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            registrations: Arc::new(AtomicU64::new(0)),
            logins: Arc::new(AtomicU64::new(0)),
            login_failures: Arc::new(AtomicU64::new(0)),
            orders_placed: Arc::new(AtomicU64::new(0)),
            reports_filed: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_requests(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_registrations(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_logins(&self) {
        self.logins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_login_failures(&self) {
        self.login_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_orders_placed(&self) {
        self.orders_placed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reports_filed(&self) {
        self.reports_filed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            logins: self.logins.load(Ordering::Relaxed),
            login_failures: self.login_failures.load(Ordering::Relaxed),
            orders_placed: self.orders_placed.load(Ordering::Relaxed),
            reports_filed: self.reports_filed.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub registrations: u64,
    pub logins: u64,
    pub login_failures: u64,
    pub orders_placed: u64,
    pub reports_filed: u64,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    /// Prometheus text exposition (format 0.0.4).
    pub fn to_prometheus(&self) -> String {
        let counters = [
            ("requests_total", "HTTP requests served", self.requests_total),
            ("registrations_total", "Accounts registered", self.registrations),
            ("logins_total", "Successful logins", self.logins),
            ("login_failures_total", "Rejected login attempts", self.login_failures),
            ("orders_placed_total", "Orders placed", self.orders_placed),
            ("reports_filed_total", "Field reports filed", self.reports_filed),
        ];
        let mut out = String::new();
        for (name, help, value) in counters {
            out.push_str(&format!(
                "# HELP agrihub_{name} {help}\n# TYPE agrihub_{name} counter\nagrihub_{name} {value}\n"
            ));
        }
        out.push_str(&format!(
            "# HELP agrihub_uptime_seconds Uptime seconds\n# TYPE agrihub_uptime_seconds gauge\nagrihub_uptime_seconds {}\n",
            self.uptime_seconds
        ));
        out
    }
}
