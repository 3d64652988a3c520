//! Deterministic feature-hashing embedder.
//!
//! Needs no model files or network access. Each identifier token (plus its
//! `snake_case` / `camelCase` parts and character trigrams) is hashed with
//! FNV-1a into a signed bucket of a fixed-size vector.

use reposcope_core::ScopeError;

use super::EmbeddingModel;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const TOKEN_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.35;

/// The only model name the hash provider answers to.
pub const HASH_MODEL: &str = "feature-hash-v1";

/// Words that carry no retrieval signal in questions about code.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "code", "do", "does", "for", "from", "how",
    "in", "is", "it", "of", "on", "or", "the", "this", "to", "what", "where", "which", "with",
    "work", "works",
];

/// Feature-hashing embedder.
///
/// # Examples
///
/// ```
/// use reposcope_search::embedding::HashEmbedder;
///
/// let embedder = HashEmbedder::new(384);
/// let a = embedder.embed_text("fn verify_password(user: &User)");
/// let b = embedder.embed_text("fn verify_password(user: &User)");
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 384);
/// ```
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashEmbedder {
    /// Create an embedder producing `dimension`-sized vectors.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            model_id: HASH_MODEL.into(),
        }
    }

    /// Raw (unnormalized) feature vector for `text`.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            self.add_feature(&mut vector, &token, TOKEN_WEIGHT);
            for gram in trigrams(&token) {
                self.add_feature(&mut vector, &gram, TRIGRAM_WEIGHT);
            }
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl EmbeddingModel for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ScopeError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ScopeError> {
        Ok(self.embed_text(text))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Lowercase tokens: every identifier, plus its snake/camel parts.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
    {
        let parts = split_identifier(word);
        let whole = word.trim_matches('_').to_lowercase();
        if parts.len() > 1 && keep(&whole) {
            tokens.push(whole);
        }
        tokens.extend(parts.into_iter().filter(|p| keep(p)));
    }
    tokens
}

fn keep(token: &str) -> bool {
    token.chars().count() > 1 && !STOPWORDS.contains(&token)
}

/// `"getUserID_fast"` -> `["get", "user", "id", "fast"]`.
fn split_identifier(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for piece in word.split('_').filter(|p| !p.is_empty()) {
        let chars: Vec<char> = piece.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            let boundary = i > 0
                && c.is_uppercase()
                && (chars[i - 1].is_lowercase()
                    || chars[i - 1].is_ascii_digit()
                    || chars.get(i + 1).is_some_and(|n| n.is_lowercase()));
            if boundary && !current.is_empty() {
                parts.push(std::mem::take(&mut current).to_lowercase());
            }
            current.push(c);
        }
        if !current.is_empty() {
            parts.push(current.to_lowercase());
        }
    }
    parts
}

fn trigrams(token: &str) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 4 {
        return Vec::new();
    }
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            0.0
        } else {
            dot / (na * nb)
        }
    }

    #[test]
    fn fnv1a_matches_reference_values() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn splits_snake_and_camel_case() {
        assert_eq!(split_identifier("getUserID"), vec!["get", "user", "id"]);
        assert_eq!(split_identifier("HTTPServer"), vec!["http", "server"]);
        assert_eq!(split_identifier("list_db_rows"), vec!["list", "db", "rows"]);
        assert_eq!(split_identifier("login"), vec!["login"]);
    }

    #[test]
    fn tokenize_drops_stopwords_and_keeps_whole_identifiers() {
        let tokens = tokenize("How does the verify_password work?");
        assert_eq!(tokens, vec!["verify_password", "verify", "password"]);
    }

    #[test]
    fn related_texts_score_higher_than_unrelated() {
        let embedder = HashEmbedder::new(384);
        let query = embedder.embed_text("How does the login functionality work?");
        let login = embedder.embed_text("def login(user, password):\n    return check(user)");
        let products = embedder.embed_text("def list_products(db):\n    return db.all()");
        assert!(cosine(&query, &login) > cosine(&query, &products));
    }

    #[test]
    fn trigrams_link_word_forms() {
        let embedder = HashEmbedder::new(384);
        let a = embedder.embed_text("authentication");
        let b = embedder.embed_text("authenticate");
        let c = embedder.embed_text("inventory");
        assert!(cosine(&a, &b) > 0.3);
        assert!(cosine(&a, &b) > cosine(&a, &c));
    }

    #[test]
    fn text_without_tokens_is_zero_vector() {
        let embedder = HashEmbedder::new(16);
        assert!(embedder.embed_text("?? !! --").iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn trait_methods_match_embed_text() {
        let embedder = HashEmbedder::new(64);
        let docs = embedder
            .embed_documents(&["fn a() {}".to_string()])
            .await
            .unwrap();
        assert_eq!(docs[0], embedder.embed_text("fn a() {}"));
        assert_eq!(embedder.dimension(), 64);
        assert_eq!(embedder.model_id(), "feature-hash-v1");
    }
}
