use core_types::{Params, ValidationError};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of hex digits of the digest kept in the key (64 bits).
const DIGEST_HEX_LEN: usize = 16;

/// Identifies one cached result.
///
/// A key is `{analysis}-{digest}`, where the digest covers the analysis name,
/// the statement text and every parameter. The statement text is included
/// because validated fragments such as a `LIMIT` are spliced into it rather
/// than bound, and they change the result just as much as a parameter does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for `analysis` run as `statement` with `params`.
    ///
    /// `analysis` becomes part of a file name, so it is restricted to
    /// lowercase ASCII letters, digits and `_`.
    pub fn derive(analysis: &str, statement: &str, params: &Params) -> Result<Self, ValidationError> {
        if !is_valid_analysis_name(analysis) {
            return Err(ValidationError::InvalidAnalysisName(analysis.to_string()));
        }
        let encoded_params = serde_json::to_vec(params)
            .map_err(|e| ValidationError::InvalidInput("cache key parameters".to_string(), e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(analysis.as_bytes());
        hasher.update([0u8]);
        hasher.update(statement.as_bytes());
        hasher.update([0u8]);
        hasher.update(&encoded_params);
        let digest = hex::encode(hasher.finalize());

        Ok(Self(format!("{analysis}-{}", &digest[..DIGEST_HEX_LEN])))
    }

    /// Key for a result that is not produced by a single statement.
    pub fn named(analysis: &str, params: &Params) -> Result<Self, ValidationError> {
        Self::derive(analysis, "", params)
    }

    /// Rebuilds a key from a cache file stem, e.g. when listing the cache directory.
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let (analysis, digest) = stem.rsplit_once('-')?;
        let well_formed = is_valid_analysis_name(analysis)
            && digest.len() == DIGEST_HEX_LEN
            && digest.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase());
        well_formed.then(|| Self(stem.to_string()))
    }

    /// The analysis name part of the key.
    pub fn analysis(&self) -> &str {
        self.0.rsplit_once('-').map_or(self.0.as_str(), |(name, _)| name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_analysis_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}
