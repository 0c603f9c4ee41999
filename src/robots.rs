use std::collections::HashMap;

/// Represents a robots.txt rule (either Allow or Disallow)
#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    is_allow: bool,
}

/// Represents a parsed robots.txt file found in a project
#[derive(Debug, Default)]
pub struct RobotsTxt {
    /// Rules grouped by user-agent (lowercased)
    rules: HashMap<String, Vec<Rule>>,
    /// `Sitemap:` directives in file order
    sitemaps: Vec<String>,
}

impl RobotsTxt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses robots.txt content
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::new();
        let mut current_agents: Vec<String> = Vec::new();
        let mut current_rules: Vec<Rule> = Vec::new();
        let mut in_rules = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();

            // Skip comments and empty lines
            if line.is_empty() {
                continue;
            }

            // Split on first colon
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    // Consecutive user-agent lines share one group
                    if in_rules {
                        robots.save_group(&current_agents, &current_rules);
                        current_agents.clear();
                        current_rules.clear();
                        in_rules = false;
                    }
                    current_agents.push(value.to_lowercase());
                }
                "disallow" | "allow" => {
                    in_rules = true;
                    if !value.is_empty() {
                        current_rules.push(Rule {
                            pattern: value.to_string(),
                            is_allow: field == "allow",
                        });
                    }
                }
                "sitemap" => {
                    if !value.is_empty() {
                        robots.sitemaps.push(value.to_string());
                    }
                }
                _ => {
                    // Ignore other directives (Crawl-delay, Host, etc.)
                }
            }
        }

        // Save last section
        robots.save_group(&current_agents, &current_rules);
        robots
    }

    fn save_group(&mut self, agents: &[String], rules: &[Rule]) {
        for agent in agents {
            self.rules
                .entry(agent.clone())
                .or_default()
                .extend(rules.iter().cloned());
        }
    }

    /// Sitemap URLs referenced by the file
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Disallow patterns that apply to every crawler, sorted
    pub fn disallowed_for_all(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self
            .rules
            .get("*")
            .map(|rules| {
                rules
                    .iter()
                    .filter(|rule| !rule.is_allow)
                    .map(|rule| rule.pattern.clone())
                    .collect()
            })
            .unwrap_or_default();
        patterns.sort();
        patterns.dedup();
        patterns
    }

    /// Checks if a path is allowed for the given user-agent
    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        // Check for user-agent-specific rules
        if let Some(rules) = self.rules.get(&user_agent.to_lowercase()) {
            return check_rules(rules, path);
        }

        // Check for wildcard (*) rules
        if let Some(rules) = self.rules.get("*") {
            return check_rules(rules, path);
        }

        // If no rules found, allow by default
        true
    }
}

/// Checks if a path matches any rules
fn check_rules(rules: &[Rule], path: &str) -> bool {
    let mut allowed = true;
    let mut most_specific_length = 0;

    // Process rules in order, keeping track of most specific match
    for rule in rules {
        if path_matches(&rule.pattern, path) {
            let pattern_len = rule.pattern.len();
            // Use the most specific (longest) matching rule
            if pattern_len >= most_specific_length {
                most_specific_length = pattern_len;
                allowed = rule.is_allow;
            }
        }
    }

    allowed
}

/// Checks if a path matches a pattern (supports * and $ wildcards).
/// Patterns without a wildcard match as a prefix.
pub fn path_matches(pattern: &str, path: &str) -> bool {
    // Handle exact match
    if pattern == path {
        return true;
    }

    // Handle end-of-string marker ($)
    let (pattern, must_end) = match pattern.strip_suffix('$') {
        Some(stripped) => (stripped, true),
        None => (pattern, false),
    };

    // If pattern doesn't contain wildcard, just check prefix
    if !pattern.contains('*') {
        if must_end {
            return path == pattern;
        }
        return path.starts_with(pattern);
    }

    let pattern_chars: Vec<char> = pattern.chars().collect();
    let path_chars: Vec<char> = path.chars().collect();
    wildcard_match(&pattern_chars, &path_chars, must_end)
}

fn wildcard_match(pattern: &[char], path: &[char], must_end: bool) -> bool {
    match pattern.split_first() {
        None => !must_end || path.is_empty(),
        Some(('*', rest)) => (0..=path.len()).any(|i| wildcard_match(rest, &path[i..], must_end)),
        Some((c, rest)) => path
            .split_first()
            .is_some_and(|(p, path_rest)| p == c && wildcard_match(rest, path_rest, must_end)),
    }
}

/// Render a robots.txt that allows everything except `disallow`
pub fn render_robots(domain: &str, disallow: &[String]) -> String {
    let mut out = String::from("User-agent: *\nAllow: /\n");
    for path in disallow {
        out.push_str(&format!("Disallow: {}\n", path));
    }
    out.push_str(&format!("\nSitemap: {}/sitemap.xml\n", domain.trim_end_matches('/')));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matches_exact() {
        assert!(path_matches("/admin", "/admin"));
        assert!(!path_matches("/admin", "/user"));
    }

    #[test]
    fn test_path_matches_prefix() {
        assert!(path_matches("/admin", "/admin/page"));
        assert!(path_matches("/admin", "/admin"));
        assert!(!path_matches("/admin", "/user"));
    }

    #[test]
    fn test_path_matches_wildcard() {
        assert!(path_matches("/admin/*", "/admin/page"));
        assert!(path_matches("/admin/*", "/admin/"));
        assert!(path_matches("/*.php", "/index.php"));
        assert!(path_matches("/*.php", "/admin/index.php"));
        assert!(!path_matches("/*.php", "/index.html"));
    }

    #[test]
    fn test_path_matches_end_marker() {
        assert!(path_matches("/admin$", "/admin"));
        assert!(!path_matches("/admin$", "/admin/"));
        assert!(!path_matches("/admin$", "/admin/page"));
        assert!(path_matches("/*.xml$", "/sitemap.xml"));
        assert!(!path_matches("/*.xml$", "/sitemap.xml.gz"));
    }

    #[test]
    fn test_parse_robots_txt() {
        let content = r#"
User-agent: *
Disallow: /admin
Disallow: /private/
Allow: /public/

User-agent: googlebot
Disallow: /secret

Sitemap: https://example.com/sitemap.xml
"#;

        let robots = RobotsTxt::parse(content);

        // Check wildcard rules
        assert_eq!(robots.rules.get("*").unwrap().len(), 3);

        // Check googlebot-specific rules
        assert_eq!(robots.rules.get("googlebot").unwrap().len(), 1);

        assert_eq!(robots.sitemaps(), ["https://example.com/sitemap.xml"]);
        assert_eq!(robots.disallowed_for_all(), vec!["/admin", "/private/"]);
    }

    #[test]
    fn test_grouped_user_agents_share_rules() {
        let content = "User-agent: bingbot\nUser-agent: googlebot\nDisallow: /tmp\n";
        let robots = RobotsTxt::parse(content);
        assert!(!robots.is_allowed("/tmp/x", "googlebot"));
        assert!(!robots.is_allowed("/tmp/x", "bingbot"));
        assert!(robots.is_allowed("/tmp/x", "duckbot"));
    }

    #[test]
    fn test_check_rules() {
        let rules = vec![
            Rule {
                pattern: "/admin".to_string(),
                is_allow: false,
            },
            Rule {
                pattern: "/admin/public".to_string(),
                is_allow: true,
            },
        ];

        // /admin should be disallowed
        assert!(!check_rules(&rules, "/admin"));

        // /admin/public should be allowed (more specific rule)
        assert!(check_rules(&rules, "/admin/public"));

        // /admin/private should be disallowed
        assert!(!check_rules(&rules, "/admin/private"));

        // /public should be allowed (no matching rule)
        assert!(check_rules(&rules, "/public"));
    }

    #[test]
    fn test_render_robots() {
        let robots = render_robots("https://example.com/", &["/api/".to_string()]);
        assert_eq!(
            robots,
            "User-agent: *\nAllow: /\nDisallow: /api/\n\nSitemap: https://example.com/sitemap.xml\n"
        );

        let parsed = RobotsTxt::parse(&robots);
        assert!(!parsed.is_allowed("/api/users", "seopilot"));
        assert!(parsed.is_allowed("/about", "seopilot"));
    }
}
