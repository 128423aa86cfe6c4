//! Remote source configuration.

use serde::{Deserialize, Serialize};
use url::Url;

/// A named remote endpoint plus its priority rank. Lower rank is tried
/// first; the configured ranks form a strict total order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSource {
    pub name: String,
    pub url: Url,
    pub rank: u32,
}

impl RemoteSource {
    pub fn new(name: impl Into<String>, url: Url, rank: u32) -> Self {
        Self {
            name: name.into(),
            url,
            rank,
        }
    }
}

/// Which sources a fetch may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Try sources in priority order, return the first success.
    Automatic,
    /// Use exactly the named source, fail if it errors.
    Pinned(String),
}

/// The stock source list, mirror order matching their historical
/// reliability.
pub fn default_sources() -> Vec<RemoteSource> {
    let urls = [
        ("tinsfox", "https://github-hosts.tinsfox.com/hosts"),
        ("hellogithub", "https://raw.hellogithub.com/hosts"),
        (
            "github520-raw",
            "https://raw.githubusercontent.com/521xueweihan/GitHub520/main/hosts",
        ),
        (
            "github520-fastly",
            "https://fastly.jsdelivr.net/gh/521xueweihan/GitHub520@main/hosts",
        ),
        (
            "github520-jsdelivr",
            "https://cdn.jsdelivr.net/gh/521xueweihan/GitHub520@main/hosts",
        ),
        (
            "ineo6-gitlab",
            "https://gitlab.com/ineo6/hosts/-/raw/master/hosts",
        ),
    ];

    urls.iter()
        .enumerate()
        .map(|(rank, (name, url))| {
            RemoteSource::new(
                *name,
                Url::parse(url).expect("stock source URL is valid"),
                rank as u32,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_sources_have_unique_strictly_increasing_ranks() {
        let sources = default_sources();
        assert!(!sources.is_empty());
        for pair in sources.windows(2) {
            assert!(pair[0].rank < pair[1].rank);
        }
    }
}
