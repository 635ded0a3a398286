/// Heuristic used at construction (`spec.md` §4.H.1) to decide whether to
/// force the read-only REST transport: a handful of well-known crawler
/// user-agent substrings. Matches case-insensitively.
const CRAWLER_MARKERS: &[&str] = &[
    "googlebot",
    "bingbot",
    "yandexbot",
    "baiduspider",
    "facebookexternalhit",
    "twitterbot",
    "linkedinbot",
    "slackbot",
    "prerender",
];

/// True iff `user_agent` looks like a known crawler/bot.
pub fn is_being_crawled(user_agent: &str) -> bool {
    let lower = user_agent.to_ascii_lowercase();
    CRAWLER_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_crawlers() {
        assert!(is_being_crawled(
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"
        ));
    }

    #[test]
    fn ordinary_browser_is_not_a_crawler() {
        assert!(!is_being_crawled(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15"
        ));
    }
}
