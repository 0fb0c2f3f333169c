use std::str::FromStr;

use derive_more::{AsRef, Debug, Display};

use crate::models::Category;

/// Rate tracker key, `"<category>:<url>"`.
#[derive(Debug, Display, AsRef, Clone, PartialEq, Eq, Hash)]
pub struct RateKey(String);

impl RateKey {
    pub fn new(category: Category, url: &str) -> Self {
        Self(format!("{category}:{url}"))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The url embedded after the category prefix.
    pub fn url(&self) -> &str {
        self.0.split_once(':').map_or("", |(_, url)| url)
    }
}

impl FromStr for RateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((category, _)) if !category.is_empty() => Ok(Self(s.into())),
            _ => Err(format!("rate key `{s}` has no category prefix")),
        }
    }
}

/// Path prefix that marks a request as excluded from logging.
#[derive(Debug, Display, AsRef, Clone, PartialEq, Eq, Hash)]
pub struct ExcludedPrefix(String);

impl ExcludedPrefix {
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(self.0.as_str())
    }
}

impl FromStr for ExcludedPrefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("an empty prefix would exclude every path".into());
        }
        Ok(Self(s.into()))
    }
}
