/// Case-insensitive keyword terms from the tree filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFilter {
    terms: Vec<String>,
}

impl KeywordFilter {
    pub fn parse(keyword: Option<&str>) -> Self {
        let terms = keyword
            .map(|keyword| {
                keyword
                    .split_whitespace()
                    .map(str::to_lowercase)
                    .collect()
            })
            .unwrap_or_default();
        Self { terms }
    }

    pub fn is_active(&self) -> bool {
        !self.terms.is_empty()
    }

    /// A label matches when it contains any term; an inactive filter matches everything.
    pub fn matches(&self, label: &str) -> bool {
        if !self.is_active() {
            return true;
        }
        let label = label.to_lowercase();
        self.terms.iter().any(|term| label.contains(term.as_str()))
    }
}
