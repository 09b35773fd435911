use reqwest::Url;

use crate::{
    error::{AppError, AppResult},
    models::{PosterResult, Tier},
};

const BACKGROUND_COLOR: &str = "1a1a2e";
const TEXT_COLOR: &str = "e94560";
const DEFAULT_SEED: &str = "MV";

/// Generated initials artwork, the terminal tier of the poster chain
#[derive(Debug, Clone)]
pub struct Placeholder {
    base: Url,
}

impl Placeholder {
    pub fn new(base_url: &str) -> AppResult<Self> {
        let base = Url::parse(base_url).map_err(|e| {
            AppError::Internal(format!("Invalid placeholder URL {}: {}", base_url, e))
        })?;
        Ok(Self { base })
    }

    /// Always succeeds
    pub fn resolve(&self, title: &str) -> PosterResult {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("seed", &initials(title))
            .append_pair("backgroundColor", BACKGROUND_COLOR)
            .append_pair("textColor", TEXT_COLOR);
        PosterResult::new(url.into(), Tier::Placeholder)
    }
}

/// Upper-cased first letters of the first two words, "MV" for a blank title
pub fn initials(title: &str) -> String {
    let seed: String = title
        .split_whitespace()
        .take(2)
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect();

    if seed.is_empty() {
        DEFAULT_SEED.to_string()
    } else {
        seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholder() -> Placeholder {
        Placeholder::new("https://api.dicebear.com/7.x/initials/svg").unwrap()
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials("The Dark Knight"), "TD");
        assert_eq!(initials("inception"), "I");
        assert_eq!(initials("  avatar   the way of water"), "AT");
        assert_eq!(initials(""), "MV");
        assert_eq!(initials("   "), "MV");
        assert_eq!(initials("élite squad"), "ÉS");
    }

    #[test]
    fn test_placeholder_url() {
        let result = placeholder().resolve("The Dark Knight");
        assert_eq!(result.tier, Tier::Placeholder);
        assert_eq!(
            result.url,
            "https://api.dicebear.com/7.x/initials/svg?seed=TD&backgroundColor=1a1a2e&textColor=e94560"
        );
    }

    #[test]
    fn test_placeholder_escapes_seed() {
        let result = placeholder().resolve("& Then There Were None");
        assert!(result.url.contains("seed=%26T"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(Placeholder::new("not a url").is_err());
    }
}
