use std::env;
use std::time::Duration;

/// Score assigned by `apply_verification` depending on the oracle's fake
/// detection verdict. The defaults match the platform's historical policy.
#[derive(Debug, Clone, Copy)]
pub struct VerificationPolicy {
    pub fake_score: f64,
    pub authentic_score: f64,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            fake_score: 0.2,
            authentic_score: 0.8,
        }
    }
}

impl VerificationPolicy {
    pub fn score_for(&self, is_fake: bool) -> f64 {
        if is_fake {
            self.fake_score
        } else {
            self.authentic_score
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Verification oracle
    pub oracle_url: String,
    pub oracle_timeout_secs: u64,
    pub verification: VerificationPolicy,

    // Notification bus
    pub bus_capacity: usize,

    // Maintenance worker
    pub sweep_interval_secs: u64,

    // Queries
    pub default_search_radius_m: f64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            oracle_url: required_env("ORACLE_URL"),
            oracle_timeout_secs: env::var("ORACLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("ORACLE_TIMEOUT_SECS must be a number"),
            verification: VerificationPolicy {
                fake_score: env::var("FAKE_SCORE")
                    .unwrap_or_else(|_| "0.2".to_string())
                    .parse()
                    .expect("FAKE_SCORE must be a number"),
                authentic_score: env::var("AUTHENTIC_SCORE")
                    .unwrap_or_else(|_| "0.8".to_string())
                    .parse()
                    .expect("AUTHENTIC_SCORE must be a number"),
            },
            bus_capacity: env::var("BUS_CAPACITY")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .expect("BUS_CAPACITY must be a number"),
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .expect("SWEEP_INTERVAL_SECS must be a number"),
            default_search_radius_m: env::var("DEFAULT_SEARCH_RADIUS_M")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .expect("DEFAULT_SEARCH_RADIUS_M must be a number"),
        }
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }
}

impl Default for Config {
    /// In-process defaults for library use and tests. No oracle URL; wire an
    /// oracle implementation directly instead.
    fn default() -> Self {
        Self {
            oracle_url: String::new(),
            oracle_timeout_secs: 30,
            verification: VerificationPolicy::default(),
            bus_capacity: 1024,
            sweep_interval_secs: 60,
            default_search_radius_m: 10_000.0,
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
