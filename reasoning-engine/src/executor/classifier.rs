use reasoning_engine_sdk::ActionCategory;

/// Maps free-text action content to an [`ActionCategory`]
pub trait ActionClassifier: Send + Sync {
    fn classify(&self, content: &str) -> ActionCategory;
}

/// Word-based classifier: the first category (in priority order) with a
/// keyword among the content's words wins, otherwise `Generic`.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    rules: Vec<(ActionCategory, Vec<String>)>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        let rules = [
            (ActionCategory::Create, &["create", "add", "new", "make", "generate"][..]),
            (ActionCategory::Update, &["update", "modify", "change", "upgrade", "edit"][..]),
            (ActionCategory::Delete, &["delete", "remove", "erase", "destroy", "drop"][..]),
            (ActionCategory::Monitor, &["monitor", "watch", "observe", "check", "status"][..]),
        ];
        Self {
            rules: rules
                .into_iter()
                .map(|(category, words)| (category, words.iter().map(|w| w.to_string()).collect()))
                .collect(),
        }
    }

    /// Append keywords for a category; rule priority is unchanged
    pub fn with_keywords(mut self, category: ActionCategory, keywords: &[&str]) -> Self {
        let words = keywords.iter().map(|w| w.to_lowercase());
        match self.rules.iter_mut().find(|(c, _)| *c == category) {
            Some((_, existing)) => existing.extend(words),
            None => self.rules.push((category, words.collect())),
        }
        self
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionClassifier for KeywordClassifier {
    fn classify(&self, content: &str) -> ActionCategory {
        let lower = content.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        self.rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| words.contains(&k.as_str())))
            .map(|(category, _)| *category)
            .unwrap_or(ActionCategory::Generic)
    }
}
