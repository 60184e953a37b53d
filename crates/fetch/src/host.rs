//! Which repository hosts may be fetched from.

use std::sync::{Arc, Mutex};

use {
    skillsync_config::{AppConfig, save_allowed_host},
    tracing::{info, warn},
};

const GITHUB_HOSTS: [&str; 2] = ["github.com", "www.github.com"];

/// Host part of a repository URL. Handles `git@host:owner/repo` too.
pub fn extract_host(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("git@") {
        return rest.split(':').next().unwrap_or_default().to_string();
    }
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

pub fn is_github_url(url: &str) -> bool {
    GITHUB_HOSTS.contains(&extract_host(url).as_str())
}

/// User answer for an unknown host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostDecision {
    /// Allow for this run only.
    Once,
    /// Allow and remember in the config file.
    Always,
    Deny,
}

/// Asks whether an unknown host may be used.
pub trait HostApprover: Send + Sync {
    fn approve(&self, host: &str, url: &str) -> HostDecision;
}

/// Denies every unknown host. Used when nobody can be asked.
pub struct DenyUnknown;

impl HostApprover for DenyUnknown {
    fn approve(&self, _host: &str, _url: &str) -> HostDecision {
        HostDecision::Deny
    }
}

/// Trust decisions for one run.
///
/// GitHub is always trusted, then `allowedHosts`, then `--trust-all`,
/// then the approver. Hosts approved with [`HostDecision::Always`] are
/// written back to the config file.
pub struct HostPolicy {
    config: Mutex<AppConfig>,
    trust_all: bool,
    approved_once: Mutex<Vec<String>>,
    approver: Arc<dyn HostApprover>,
}

impl HostPolicy {
    pub fn new(config: AppConfig, trust_all: bool, approver: Arc<dyn HostApprover>) -> Self {
        Self {
            config: Mutex::new(config),
            trust_all,
            approved_once: Mutex::new(Vec::new()),
            approver,
        }
    }

    /// Whether `url` may be fetched.
    pub fn is_allowed(&self, url: &str) -> bool {
        if is_github_url(url) {
            return true;
        }
        let host = extract_host(url);

        if let Ok(config) = self.config.lock()
            && config.allowed_hosts.iter().any(|h| h == &host)
        {
            return true;
        }
        if self.trust_all {
            return true;
        }
        if let Ok(once) = self.approved_once.lock()
            && once.contains(&host)
        {
            return true;
        }

        match self.approver.approve(&host, url) {
            HostDecision::Deny => {
                warn!(%host, %url, "host denied");
                false
            },
            HostDecision::Once => {
                if let Ok(mut once) = self.approved_once.lock() {
                    once.push(host);
                }
                true
            },
            HostDecision::Always => {
                match self.config.lock() {
                    Ok(mut config) => {
                        save_allowed_host(&mut config, &host);
                        info!(%host, "added host to allowedHosts");
                    },
                    Err(_) => warn!(%host, "could not record allowed host"),
                }
                true
            },
        }
    }

    /// Hosts currently listed in `allowedHosts`.
    pub fn allowed_hosts(&self) -> Vec<String> {
        self.config
            .lock()
            .map(|c| c.allowed_hosts.clone())
            .unwrap_or_default()
    }
}
