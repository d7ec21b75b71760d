use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
};

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{
    info,
    level_filters::LevelFilter,
    warn,
};
use url::Url;

use crate::{
    error::{
        InterceptError,
        Result,
    },
    executor::ComputeExecutor,
    interceptor::Interceptor,
    pow::{
        CurlProofOfWork,
        curl::HASH_LENGTH,
    },
    server::InterceptorServer,
    upstream::HttpUpstream,
};

/// Used when the configured max MWM is not an integer.
pub const DEFAULT_MAX_MWM: u8 = 14;
/// Used when the configured max bundle size is not an integer.
pub const DEFAULT_MAX_BUNDLE_TXS: usize = 20;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "attachToTangle proof of work interceptor", long_about = None)]
pub struct Config {
    /// Highest min weight magnitude a caller may request
    #[arg(value_name = "MAX_MWM")]
    pub max_mwm: String,
    /// Highest number of transactions in a single attachToTangle bundle
    #[arg(value_name = "MAX_BUNDLE_TXS")]
    pub max_bundle_txs: String,
    /// Address the interceptor listens on
    #[arg(long, env = "POW_INTERCEPTOR_LISTEN_ADDR", default_value = "0.0.0.0:14265")]
    pub listen_addr: SocketAddr,
    /// Node API every request that is not intercepted is forwarded to
    #[arg(long, env = "POW_INTERCEPTOR_UPSTREAM", default_value = "http://127.0.0.1:14266")]
    pub upstream: Url,
    /// Log level
    #[arg(long, env = "POW_INTERCEPTOR_LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,
    /// Append logs to this file in addition to stdout
    #[arg(long, env = "POW_INTERCEPTOR_LOG_FILE")]
    pub log_file: Option<PathBuf>,
    /// Reject attachToTangle calls with 503 once this many are queued or running.
    /// Unbounded when unset.
    #[arg(long, env = "POW_INTERCEPTOR_MAX_PENDING")]
    pub max_pending: Option<usize>,
    /// Nonce search threads, defaults to the available parallelism
    #[arg(long, env = "POW_INTERCEPTOR_POW_THREADS")]
    pub pow_threads: Option<usize>,
}

/// Ceilings enforced on every intercepted request. Fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    max_mwm: u8,
    max_bundle_txs: usize,
}

impl Limits {
    pub fn new(max_mwm: u8, max_bundle_txs: usize) -> Result<Self> {
        if usize::from(max_mwm) > HASH_LENGTH {
            return Err(InterceptError::InvalidConfig(format!(
                "max MWM {max_mwm} exceeds the hash length of {HASH_LENGTH} trits"
            )));
        }
        Ok(Self {
            max_mwm,
            max_bundle_txs,
        })
    }

    pub fn max_mwm(&self) -> u8 {
        self.max_mwm
    }

    pub fn max_bundle_txs(&self) -> usize {
        self.max_bundle_txs
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_mwm: DEFAULT_MAX_MWM,
            max_bundle_txs: DEFAULT_MAX_BUNDLE_TXS,
        }
    }
}

impl Config {
    /// Resolves the positional limits. A value that is not an integer falls
    /// back to its default, an integer out of range is a configuration error.
    pub fn limits(&self) -> Result<Limits> {
        let max_mwm = match self.max_mwm.trim().parse::<i64>() {
            Ok(value) => u8::try_from(value).map_err(|_| {
                InterceptError::InvalidConfig(format!("max MWM {value} is out of range"))
            })?,
            Err(_) => {
                warn!(max_mwm = DEFAULT_MAX_MWM, "setting max allowed MWM to default");
                DEFAULT_MAX_MWM
            }
        };
        let max_bundle_txs = match self.max_bundle_txs.trim().parse::<i64>() {
            Ok(value) => usize::try_from(value).map_err(|_| {
                InterceptError::InvalidConfig(format!("max bundle txs {value} is out of range"))
            })?,
            Err(_) => {
                warn!(
                    max_bundle_txs = DEFAULT_MAX_BUNDLE_TXS,
                    "setting max txs per bundle to default"
                );
                DEFAULT_MAX_BUNDLE_TXS
            }
        };
        Limits::new(max_mwm, max_bundle_txs)
    }

    /// Build the interceptor server
    pub async fn build(self) -> anyhow::Result<InterceptorServer> {
        let limits = self.limits()?;
        let upstream = HttpUpstream::new(self.upstream.clone())?;

        let pow = CurlProofOfWork::new(self.pow_threads)?;
        info!(threads = pow.threads(), "nonce search thread pool ready");
        let executor = ComputeExecutor::new(Arc::new(pow)).with_max_pending(self.max_pending);
        info!(implementation = executor.pow_name(), "using PoW implementation");

        let listener = TcpListener::bind(&self.listen_addr).await?;
        info!(listen_addr = ?self.listen_addr, upstream = %upstream.base(), "Listening on address");

        let interceptor = Interceptor::new(limits, executor, Arc::new(upstream));
        info!(
            max_bundle_txs = interceptor.limits().max_bundle_txs(),
            max_mwm = interceptor.limits().max_mwm(),
            max_pending = ?self.max_pending,
            "attachToTangle interception configured"
        );

        Ok(InterceptorServer::new(listener, interceptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::try_parse_from(vec!["program", "14", "20"]).unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:14265".parse().unwrap());
        assert_eq!(config.upstream.as_str(), "http://127.0.0.1:14266/");
        assert_eq!(config.log_level, LevelFilter::INFO);
        assert!(config.log_file.is_none());
        assert!(config.max_pending.is_none());
        assert!(config.pow_threads.is_none());
        assert_eq!(config.limits().unwrap(), Limits::new(14, 20).unwrap());
    }

    #[test]
    fn test_config_args() {
        let config = Config::try_parse_from(vec![
            "program",
            "9",
            "5",
            "--listen-addr",
            "127.0.0.1:8080",
            "--upstream",
            "http://node:14265",
            "--log-level",
            "debug",
            "--log-file",
            "/tmp/interceptor.log",
            "--max-pending",
            "4",
            "--pow-threads",
            "2",
        ])
        .unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.upstream.host_str(), Some("node"));
        assert_eq!(config.log_level, LevelFilter::DEBUG);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/interceptor.log")));
        assert_eq!(config.max_pending, Some(4));
        assert_eq!(config.pow_threads, Some(2));

        let limits = config.limits().unwrap();
        assert_eq!(limits.max_mwm(), 9);
        assert_eq!(limits.max_bundle_txs(), 5);
    }

    #[test]
    fn test_limits_require_exactly_two_arguments() {
        assert!(Config::try_parse_from(vec!["program"]).is_err());
        assert!(Config::try_parse_from(vec!["program", "14"]).is_err());
        assert!(Config::try_parse_from(vec!["program", "14", "20", "30"]).is_err());
    }

    #[test]
    fn test_unparsable_limits_fall_back_to_defaults() {
        let config = Config::try_parse_from(vec!["program", "high", "many"]).unwrap();
        assert_eq!(config.limits().unwrap(), Limits::default());

        let config = Config::try_parse_from(vec!["program", "12", "lots"]).unwrap();
        let limits = config.limits().unwrap();
        assert_eq!(limits.max_mwm(), 12);
        assert_eq!(limits.max_bundle_txs(), DEFAULT_MAX_BUNDLE_TXS);
    }

    #[test]
    fn test_out_of_range_limits_are_rejected() {
        let config = Config::try_parse_from(vec!["program", "244", "20"]).unwrap();
        assert!(matches!(
            config.limits(),
            Err(InterceptError::InvalidConfig(_))
        ));

        let config = Config::try_parse_from(vec!["program", "--", "14", "-1"]).unwrap();
        assert!(matches!(
            config.limits(),
            Err(InterceptError::InvalidConfig(_))
        ));
    }
}
