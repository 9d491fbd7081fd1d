//! `is_allowed(url)` robots checker with a 24h per-host cache.
//!
//! The directive parser itself is reused near-verbatim; this module adds the
//! per-host fetch-once-per-24h caching layer around it.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Default)]
struct AgentRules {
    disallow: Vec<String>,
    allow: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    rules: HashMap<String, AgentRules>,
    default_rules: AgentRules,
}

impl RobotsTxt {
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();
        let mut current_agents: Vec<String> = Vec::new();
        let mut current_rules = AgentRules::default();

        let flush = |robots: &mut Self, agents: &[String], rules: &AgentRules| {
            for agent in agents {
                if agent == "*" {
                    robots.default_rules = rules.clone();
                } else {
                    robots.rules.insert(agent.clone(), rules.clone());
                }
            }
        };

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if !current_agents.is_empty() {
                        flush(&mut robots, &current_agents, &current_rules);
                        current_rules = AgentRules::default();
                        current_agents.clear();
                    }
                    current_agents.push(value.to_lowercase());
                }
                "disallow" => {
                    if !value.is_empty() {
                        current_rules.disallow.push(value.to_string());
                    }
                }
                "allow" => {
                    if !value.is_empty() {
                        current_rules.allow.push(value.to_string());
                    }
                }
                _ => {}
            }
        }
        flush(&mut robots, &current_agents, &current_rules);
        robots
    }

    fn rules_for(&self, user_agent: &str) -> &AgentRules {
        let agent_lower = user_agent.to_lowercase();
        self.rules
            .get(&agent_lower)
            .or_else(|| self.rules.iter().find(|(k, _)| agent_lower.contains(k.as_str())).map(|(_, v)| v))
            .unwrap_or(&self.default_rules)
    }

    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let rules = self.rules_for(user_agent);
        for allow in &rules.allow {
            if path.starts_with(allow) {
                return true;
            }
        }
        for disallow in &rules.disallow {
            if disallow == "/" || path.starts_with(disallow) {
                return false;
            }
        }
        true
    }
}

struct CacheEntry {
    robots: RobotsTxt,
    fetched_at: tokio::time::Instant,
}

/// Fetches and caches robots.txt once per host for 24h. Permissive on fetch
/// error or non-200 response; not fatal.
pub struct RobotsChecker {
    client: reqwest::Client,
    user_agent: String,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl RobotsChecker {
    pub fn new(client: reqwest::Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let Some(host) = parsed.host_str() else {
            return true;
        };
        let host = host.to_string();
        let scheme = parsed.scheme().to_string();
        let path = parsed.path().to_string();

        let robots = self.get_or_fetch(&scheme, &host).await;
        robots.is_allowed(&self.user_agent, &path)
    }

    async fn get_or_fetch(&self, scheme: &str, host: &str) -> RobotsTxt {
        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(host) {
                if entry.fetched_at.elapsed() < CACHE_TTL {
                    return entry.robots.clone();
                }
            }
        }

        let robots = self.fetch(scheme, host).await;
        let mut cache = self.cache.lock().await;
        cache.insert(
            host.to_string(),
            CacheEntry {
                robots: robots.clone(),
                fetched_at: tokio::time::Instant::now(),
            },
        );
        robots
    }

    async fn fetch(&self, scheme: &str, host: &str) -> RobotsTxt {
        let url = format!("{scheme}://{host}/robots.txt");
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => RobotsTxt::parse(&body),
                Err(_) => RobotsTxt::default(),
            },
            _ => RobotsTxt::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_allow_overrides_disallow() {
        let content = "User-agent: *\nDisallow: /private/\nAllow: /private/public/\n";
        let robots = RobotsTxt::parse(content);
        assert!(!robots.is_allowed("Bot", "/private/secret"));
        assert!(robots.is_allowed("Bot", "/private/public/page"));
    }

    #[test]
    fn empty_robots_allows_everything() {
        let robots = RobotsTxt::parse("");
        assert!(robots.is_allowed("AnyBot", "/any/path"));
    }

    #[test]
    fn disallow_all_blocks_everything() {
        let robots = RobotsTxt::parse("User-agent: *\nDisallow: /\n");
        assert!(!robots.is_allowed("Bot", "/anything"));
    }

    #[tokio::test]
    async fn fetch_error_is_permissive() {
        let checker = RobotsChecker::new(reqwest::Client::new(), "TestBot/1.0");
        // Port 1 should never have a listener; connection fails, not fatal.
        let allowed = checker.is_allowed("http://127.0.0.1:1/some/path").await;
        assert!(allowed);
    }
}
