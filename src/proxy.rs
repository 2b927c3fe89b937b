use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::collections::HashSet;
use std::fmt;

/// A single rotating proxy, as listed in the proxy file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyEndpoint {
    /// Parses `host:port` or `host:port:user:pass`.
    ///
    /// Provider exports sometimes carry extra fields in the middle; the
    /// credentials are always the last two fields.
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.trim().split(':').collect();
        if parts.len() != 2 && parts.len() < 4 {
            bail!("Expected host:port or host:port:user:pass, got '{}'", line.trim());
        }

        let host = parts[0].trim();
        if host.is_empty() {
            bail!("Missing proxy host in '{}'", line.trim());
        }
        let port = parts[1]
            .trim()
            .parse::<u16>()
            .with_context(|| format!("Invalid proxy port '{}'", parts[1]))?;

        let (username, password) = if parts.len() >= 4 {
            (
                Some(parts[parts.len() - 2].to_string()),
                Some(parts[parts.len() - 1].to_string()),
            )
        } else {
            (None, None)
        };

        Ok(Self {
            host: host.to_string(),
            port,
            username,
            password,
        })
    }

    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.username {
            Some(user) => write!(f, "{}@{}:{}", user, self.host, self.port),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

/// Round-robin proxy pool with per-host block tracking.
#[derive(Debug)]
pub struct ProxyRotation {
    endpoints: Vec<ProxyEndpoint>,
    counter: usize,
    blocked_hosts: HashSet<String>,
    hosts: HashSet<String>,
}

impl ProxyRotation {
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Result<Self> {
        if endpoints.is_empty() {
            bail!("Proxy pool is empty");
        }
        let hosts = endpoints.iter().map(|e| e.host.clone()).collect();

        Ok(Self {
            endpoints,
            counter: 0,
            blocked_hosts: HashSet::new(),
            hosts,
        })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn current(&self) -> &ProxyEndpoint {
        &self.endpoints[self.counter % self.endpoints.len()]
    }

    pub fn advance(&mut self) {
        self.counter += 1;
    }

    pub fn is_blocked(&self, host: &str) -> bool {
        self.blocked_hosts.contains(host)
    }

    /// Returns true if the host belongs to the pool and was not already
    /// blocked. Hosts outside the pool are ignored.
    pub fn mark_blocked(&mut self, host: &str) -> bool {
        if !self.hosts.contains(host) {
            debug!("Ignoring block of unknown proxy host {}", host);
            return false;
        }
        let newly_blocked = self.blocked_hosts.insert(host.to_string());
        if newly_blocked {
            info!(
                "Proxy IP {} is blocked. Adding to blocked IPs list ({}/{})",
                host,
                self.blocked_hosts.len(),
                self.hosts.len()
            );
        }
        newly_blocked
    }

    pub fn is_exhausted(&self) -> bool {
        self.blocked_hosts.len() >= self.hosts.len()
    }

    /// Skips over blocked endpoints and returns the next usable one.
    ///
    /// Every skipped endpoint advances the counter.
    pub fn next_available(&mut self) -> Option<ProxyEndpoint> {
        while !self.is_exhausted() {
            let candidate = self.current();
            if !self.is_blocked(&candidate.host) {
                return Some(candidate.clone());
            }
            debug!("Proxy IP {} is blocked. Skipping...", candidate.host);
            self.advance();
        }
        None
    }

    pub fn cooldown_due(&self, every: usize) -> bool {
        every > 0 && self.counter > 0 && self.counter % every == 0
    }

    pub fn blocked_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.blocked_hosts.iter().cloned().collect();
        hosts.sort();
        hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(lines: &[&str]) -> ProxyRotation {
        let endpoints = lines
            .iter()
            .map(|l| ProxyEndpoint::parse(l).unwrap())
            .collect();
        ProxyRotation::new(endpoints).unwrap()
    }

    #[test]
    fn parses_provider_format_with_credentials() {
        let proxy = ProxyEndpoint::parse("45.12.8.1:12323:user01:s3cret").unwrap();
        assert_eq!(proxy.host, "45.12.8.1");
        assert_eq!(proxy.port, 12323);
        assert_eq!(proxy.username.as_deref(), Some("user01"));
        assert_eq!(proxy.password.as_deref(), Some("s3cret"));
        assert_eq!(proxy.proxy_url(), "http://45.12.8.1:12323");
    }

    #[test]
    fn credentials_are_taken_from_the_last_two_fields() {
        let proxy = ProxyEndpoint::parse("10.0.0.1:8080:extra:user:pass").unwrap();
        assert_eq!(proxy.username.as_deref(), Some("user"));
        assert_eq!(proxy.password.as_deref(), Some("pass"));
    }

    #[test]
    fn parses_bare_host_and_port() {
        let proxy = ProxyEndpoint::parse(" 10.0.0.1:3128 ").unwrap();
        assert_eq!(proxy.username, None);
        assert_eq!(proxy.to_string(), "10.0.0.1:3128");
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(ProxyEndpoint::parse("10.0.0.1").is_err());
        assert!(ProxyEndpoint::parse("10.0.0.1:port").is_err());
        assert!(ProxyEndpoint::parse("10.0.0.1:80:onlyuser").is_err());
        assert!(ProxyEndpoint::parse(":80").is_err());
    }

    #[test]
    fn display_hides_password() {
        let proxy = ProxyEndpoint::parse("1.2.3.4:80:bob:hunter2").unwrap();
        assert!(!proxy.to_string().contains("hunter2"));
    }

    #[test]
    fn empty_pool_is_rejected() {
        assert!(ProxyRotation::new(Vec::new()).is_err());
    }

    #[test]
    fn rotates_round_robin() {
        let mut rotation = pool(&["1.1.1.1:80", "2.2.2.2:80"]);
        assert_eq!(rotation.current().host, "1.1.1.1");
        rotation.advance();
        assert_eq!(rotation.current().host, "2.2.2.2");
        rotation.advance();
        assert_eq!(rotation.current().host, "1.1.1.1");
    }

    #[test]
    fn next_available_skips_blocked_hosts_and_advances() {
        let mut rotation = pool(&["1.1.1.1:80", "2.2.2.2:80", "3.3.3.3:80"]);
        rotation.mark_blocked("1.1.1.1");
        let next = rotation.next_available().unwrap();
        assert_eq!(next.host, "2.2.2.2");
        assert_eq!(rotation.counter(), 1);
    }

    #[test]
    fn blocking_is_per_host() {
        let mut rotation = pool(&["1.1.1.1:80", "1.1.1.1:81", "2.2.2.2:80"]);
        rotation.mark_blocked("1.1.1.1");
        assert!(!rotation.is_exhausted());
        assert_eq!(rotation.next_available().unwrap().host, "2.2.2.2");
    }

    #[test]
    fn exhausted_once_every_distinct_host_is_blocked() {
        let mut rotation = pool(&["1.1.1.1:80", "1.1.1.1:81", "2.2.2.2:80"]);
        assert!(rotation.mark_blocked("1.1.1.1"));
        assert!(!rotation.mark_blocked("1.1.1.1"));
        rotation.mark_blocked("2.2.2.2");
        assert!(rotation.is_exhausted());
        assert!(rotation.next_available().is_none());
        assert_eq!(rotation.blocked_hosts(), vec!["1.1.1.1", "2.2.2.2"]);
    }

    #[test]
    fn hosts_outside_the_pool_do_not_count_towards_exhaustion() {
        let mut rotation = pool(&["1.1.1.1:80", "2.2.2.2:80"]);
        assert!(!rotation.mark_blocked("9.9.9.9"));
        rotation.mark_blocked("1.1.1.1");
        assert!(!rotation.is_exhausted());
        assert!(rotation.blocked_hosts().iter().all(|h| h != "9.9.9.9"));
        assert_eq!(rotation.next_available().unwrap().host, "2.2.2.2");
    }

    #[test]
    fn cooldown_every_n_requests() {
        let mut rotation = pool(&["1.1.1.1:80"]);
        assert!(!rotation.cooldown_due(10));
        for _ in 0..10 {
            rotation.advance();
        }
        assert!(rotation.cooldown_due(10));
        rotation.advance();
        assert!(!rotation.cooldown_due(10));
        assert!(!rotation.cooldown_due(0));
    }
}
