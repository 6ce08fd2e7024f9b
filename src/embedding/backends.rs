//! Embedding backends
//!
//! The model itself is opaque: anything implementing [`Embedder`] can sit
//! behind the gateway. Shipped backends:
//!
//! - [`HashEmbedder`]: FNV-1a feature hashing, deterministic, no model.
//! - [`ApiEmbedder`]: OpenAI-compatible `/embeddings` HTTP endpoint.
//! - [`FallbackEmbedder`]: ordered chain, first backend that answers wins.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::EmbeddingConfig;
use crate::error::{LinkError, Result};

/// Pluggable embedding backend interface
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn dims(&self) -> usize;

    fn name(&self) -> &str;
}

/// Build an embedder from embedding config.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    let dims = config.dims;
    if dims == 0 {
        return Err(LinkError::Config(
            "embedding.dims must be greater than 0".to_string(),
        ));
    }

    let primary = build_backend(config, config.backend.as_str(), dims)?;
    match config.fallback_backend.as_deref().map(str::trim) {
        None | Some("") => Ok(primary),
        Some(fallback) => {
            let secondary = build_backend(config, fallback, dims)?;
            Ok(Box::new(FallbackEmbedder::new(vec![primary, secondary])))
        }
    }
}

fn build_backend(config: &EmbeddingConfig, backend: &str, dims: usize) -> Result<Box<dyn Embedder>> {
    match backend.trim().to_lowercase().as_str() {
        "" | "hash" => Ok(Box::new(HashEmbedder::new(dims))),
        "api" => {
            let url = config.api_url.clone().ok_or_else(|| {
                LinkError::MissingConfig("embedding.api_url is required for the api backend".into())
            })?;
            let api_key = config
                .api_key_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok());
            Ok(Box::new(ApiEmbedder::new(
                url,
                config.api_model.clone(),
                api_key,
                dims,
                Duration::from_millis(config.timeout_ms.max(1)),
            )?))
        }
        other => Err(LinkError::Config(format!(
            "unknown embedding backend: {other}"
        ))),
    }
}

/// Hash embedder using FNV-1a
pub struct HashEmbedder {
    dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dim: 384 }
    }
}

impl HashEmbedder {
    pub const fn new(dim: usize) -> Self {
        Self { dim }
    }

    /// Embed text into an L2-normalized vector. Unigrams weigh 1.0,
    /// adjacent bigrams 0.5.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        if self.dim == 0 {
            return Vec::new();
        }

        let tokens = tokenize(text);
        let mut embedding = vec![0.0; self.dim];

        if tokens.is_empty() {
            return embedding;
        }

        for token in &tokens {
            accumulate_embedding(&mut embedding, token, 1.0);
        }

        for window in tokens.windows(2) {
            let bigram = format!("{} {}", window[0], window[1]);
            accumulate_embedding(&mut embedding, &bigram, 0.5);
        }

        l2_normalize(&mut embedding);
        embedding
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dims(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Lower-cased alphanumeric tokens; CJK characters become single-char
/// tokens so Chinese text still spreads across dimensions.
fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut tokens = Vec::new();
    for word in lowered.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#')) {
        if word.chars().any(is_cjk) {
            tokens.extend(word.chars().filter(|c| is_cjk(*c)).map(String::from));
        } else if word.len() >= 2 {
            tokens.push(word.to_string());
        }
    }
    tokens
}

pub(crate) const fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fa5}')
}

/// Hashing trick: one signed bucket per token.
fn accumulate_embedding(embedding: &mut [f32], token: &str, weight: f32) {
    let mixed = mix64(fnv1a_hash(token.as_bytes()));
    let bucket = usize::try_from(mixed % embedding.len() as u64).unwrap_or(0);
    let sign = if mixed >> 63 == 0 { weight } else { -weight };
    embedding[bucket] += sign;
}

/// SplitMix64 finalizer. FNV-1a low bits only see low input bits, so the
/// hash is avalanched before taking a bucket.
const fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn fnv1a_hash(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vec.iter_mut() {
            *value /= norm;
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

/// Remote embedder speaking the OpenAI `/embeddings` wire format.
pub struct ApiEmbedder {
    client: reqwest::blocking::Client,
    url: String,
    model: Option<String>,
    api_key: Option<String>,
    dims: usize,
}

impl ApiEmbedder {
    pub fn new(
        url: impl Into<String>,
        model: Option<String>,
        api_key: Option<String>,
        dims: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LinkError::Http(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            model,
            api_key,
            dims,
        })
    }

    fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: self.model.as_deref(),
            input: texts,
        };
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .map_err(|err| LinkError::EmbeddingUnavailable(format!("request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LinkError::EmbeddingUnavailable(format!(
                "embedding endpoint returned {status}"
            )));
        }
        let mut parsed: EmbeddingResponse = response
            .json()
            .map_err(|err| LinkError::EmbeddingUnavailable(format!("bad response body: {err}")))?;

        if parsed.data.len() != texts.len() {
            return Err(LinkError::EmbeddingUnavailable(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|datum| datum.index.unwrap_or(usize::MAX));
        Ok(parsed.data.into_iter().map(|datum| datum.embedding).collect())
    }
}

impl Embedder for ApiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text.to_string()])?
            .pop()
            .ok_or_else(|| LinkError::EmbeddingUnavailable("empty response".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts)
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "api"
    }
}

/// Tries backends in order; the first success wins.
pub struct FallbackEmbedder {
    chain: Vec<Box<dyn Embedder>>,
}

impl FallbackEmbedder {
    pub fn new(chain: Vec<Box<dyn Embedder>>) -> Self {
        Self { chain }
    }

    fn run<T>(&self, op: impl Fn(&dyn Embedder) -> Result<T>) -> Result<T> {
        let mut last_error = None;
        for (position, backend) in self.chain.iter().enumerate() {
            match op(backend.as_ref()) {
                Ok(value) => {
                    if position > 0 {
                        warn!(backend = backend.name(), "using fallback embedding backend");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    warn!(
                        backend = backend.name(),
                        error = %err,
                        "embedding backend failed, trying next in chain"
                    );
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            LinkError::EmbeddingUnavailable("no embedding backends configured".to_string())
        }))
    }
}

impl Embedder for FallbackEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.run(|backend| backend.embed(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.run(|backend| backend.embed_batch(texts))
    }

    fn dims(&self) -> usize {
        self.chain.first().map_or(0, |backend| backend.dims())
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::semantic::cosine_similarity;
    use crate::test_utils::FailingEmbedder;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_fnv1a_hash_known_value() {
        assert_eq!(fnv1a_hash(b"hello"), 0xa430_d846_80aa_bd0b);
    }

    #[test]
    fn hash_embedding_has_configured_dims_and_unit_norm() {
        let embedder = HashEmbedder::new(64);
        let embedding = embedder.embed("closures and scope").unwrap();
        assert_eq!(embedding.len(), 64);
        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    fn hash_embedding_of_short_tokens_is_zero() {
        let embedder = HashEmbedder::new(32);
        let embedding = embedder.embed("a b c").unwrap();
        assert!(embedding.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn hash_embedding_handles_cjk() {
        let embedder = HashEmbedder::new(128);
        let a = embedder.embed("异步编程").unwrap();
        let b = embedder.embed("异步").unwrap();
        let c = embedder.embed("字典").unwrap();
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[test]
    fn similarity_prefers_related_text() {
        let embedder = HashEmbedder::new(128);
        let a = embedder.embed("javascript promise then catch").unwrap();
        let b = embedder.embed("promise then chaining").unwrap();
        let c = embedder.embed("python dictionary comprehension").unwrap();
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[test]
    fn unrelated_texts_stay_under_semantic_floor() {
        let embedder = HashEmbedder::new(384);
        let query = embedder.embed("javascript promise then catch").unwrap();
        let related = embedder.embed("promise then chaining").unwrap();
        for unrelated in [
            "python dictionary comprehension",
            "zebra giraffe elephant",
            "Loops Repeat work with for and while.",
        ] {
            let other = embedder.embed(unrelated).unwrap();
            let similarity = cosine_similarity(&query, &other);
            assert!(similarity.abs() < 0.3, "{unrelated}: {similarity}");
        }
        assert!(cosine_similarity(&query, &related) > 0.3);
    }

    #[test]
    fn mixing_spreads_low_bit_neighbours() {
        let buckets: std::collections::HashSet<u64> =
            (0..64u64).map(|i| mix64(i << 8) % 1024).collect();
        assert!(buckets.len() > 48);
    }

    #[test]
    fn fallback_uses_next_backend_on_failure() {
        let chain = FallbackEmbedder::new(vec![
            Box::new(FailingEmbedder::new(16)),
            Box::new(HashEmbedder::new(16)),
        ]);
        assert_eq!(chain.embed("loops").unwrap().len(), 16);
        assert_eq!(chain.dims(), 16);
    }

    #[test]
    fn fallback_reports_last_error_when_all_fail() {
        let chain = FallbackEmbedder::new(vec![Box::new(FailingEmbedder::new(8))]);
        assert!(matches!(
            chain.embed("x"),
            Err(LinkError::EmbeddingUnavailable(_))
        ));
        let empty = FallbackEmbedder::new(Vec::new());
        assert!(empty.embed("x").is_err());
    }

    #[test]
    fn build_embedder_rejects_zero_dims_and_unknown_backend() {
        let mut config = EmbeddingConfig {
            dims: 0,
            ..EmbeddingConfig::default()
        };
        assert!(build_embedder(&config).is_err());

        config.dims = 32;
        config.backend = "quantum".to_string();
        assert!(build_embedder(&config).is_err());

        config.backend = "api".to_string();
        config.api_url = None;
        assert!(matches!(
            build_embedder(&config),
            Err(LinkError::MissingConfig(_))
        ));
    }

    #[test]
    fn build_embedder_wraps_fallback_chain() {
        let config = EmbeddingConfig {
            backend: "hash".to_string(),
            fallback_backend: Some("hash".to_string()),
            dims: 24,
            ..EmbeddingConfig::default()
        };
        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.name(), "fallback");
        assert_eq!(embedder.dims(), 24);
    }

    #[test]
    fn api_embedder_parses_openai_response() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/embeddings")
                .header("authorization", "Bearer secret")
                .json_body(json!({"model": "bge-small", "input": ["first", "second"]}));
            then.status(200).json_body(json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            }));
        });

        let embedder = ApiEmbedder::new(
            server.url("/v1/embeddings"),
            Some("bge-small".to_string()),
            Some("secret".to_string()),
            2,
            Duration::from_secs(5),
        )
        .unwrap();
        let vectors = embedder
            .embed_batch(&["first".to_string(), "second".to_string()])
            .unwrap();

        mock.assert();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn api_embedder_maps_server_errors_to_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(503);
        });

        let embedder = ApiEmbedder::new(
            server.url("/embeddings"),
            None,
            None,
            2,
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(matches!(
            embedder.embed("hello"),
            Err(LinkError::EmbeddingUnavailable(_))
        ));
    }
}
