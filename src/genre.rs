use crate::config::GenreCategory;

/// Category assigned to genres no keyword matches.
pub const FALLBACK_CATEGORY: &str = "other";

/// Maps a genre name to the name of its category.
///
/// Called once per genre, the first time the genre is seen without a
/// category. Implementations must be pure.
pub trait GenreCategorizer: Send + Sync {
    fn categorize(&self, genre_name: &str) -> String;
}

/// Picks the first category, in table order, that has a keyword contained in
/// the lower-cased genre name.
#[derive(Debug, Clone)]
pub struct KeywordCategorizer {
    categories: Vec<GenreCategory>,
}

impl KeywordCategorizer {
    pub fn new(categories: Vec<GenreCategory>) -> Self {
        let categories = categories
            .into_iter()
            .map(|c| GenreCategory {
                name: c.name,
                keywords: c.keywords.into_iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();
        Self { categories }
    }
}

impl GenreCategorizer for KeywordCategorizer {
    fn categorize(&self, genre_name: &str) -> String {
        let genre_name = genre_name.to_lowercase();
        self.categories
            .iter()
            .find(|c| c.keywords.iter().any(|k| genre_name.contains(k.as_str())))
            .map(|c| c.name.clone())
            .unwrap_or_else(|| FALLBACK_CATEGORY.to_string())
    }
}
