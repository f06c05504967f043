use crate::config::{default_keywords, normalize_keywords};

/// Decides whether a message is an actionable query by keyword presence.
#[derive(Debug, Clone)]
pub struct Classifier {
    keywords: Vec<String>,
}

impl Classifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: normalize_keywords(keywords),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// True iff any keyword occurs as a substring of the lower-cased
    /// `subject + " " + body`. Missing parts count as empty.
    pub fn is_query(&self, subject: Option<&str>, body: Option<&str>) -> bool {
        self.matched_keyword(subject, body).is_some()
    }

    /// First keyword, in configured order, found in the message text.
    pub fn matched_keyword(&self, subject: Option<&str>, body: Option<&str>) -> Option<&str> {
        let text = format!(
            "{} {}",
            subject.unwrap_or_default(),
            body.unwrap_or_default()
        )
        .to_lowercase();

        self.keywords
            .iter()
            .find(|keyword| text.contains(keyword.as_str()))
            .map(String::as_str)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
        }
    }
}
