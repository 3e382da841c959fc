use anyhow::{Context, Result, bail, ensure};
use std::collections::HashSet;

/// Upper bound on how many seeds a single range token may expand to.
const MAX_RANGE_SEEDS: u64 = 10_000;

/// Seed metadata used for logic and playability analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    /// CLI token the seed came from.
    pub source: String,
}

impl SeedInfo {
    #[must_use]
    pub fn from_numeric(seed: u64) -> Self {
        Self {
            seed,
            source: seed.to_string(),
        }
    }
}

/// Resolve a list of CLI seed arguments into canonical seed metadata.
///
/// Supports literal integers (negative values use their magnitude) and
/// half-open `a..b` ranges. Duplicates keep their first position.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }
        for info in parse_token(token)? {
            if seen.insert(info.seed) {
                resolved.push(info);
            }
        }
    }

    if resolved.is_empty() {
        resolved.push(SeedInfo::from_numeric(1337));
    }

    Ok(resolved)
}

fn parse_token(token: &str) -> Result<Vec<SeedInfo>> {
    if let Some((start, end)) = token.split_once("..") {
        let start: u64 = start
            .trim()
            .parse()
            .with_context(|| format!("invalid range start in seed token: {token}"))?;
        let end: u64 = end
            .trim()
            .parse()
            .with_context(|| format!("invalid range end in seed token: {token}"))?;
        ensure!(start < end, "empty seed range: {token}");
        ensure!(
            end - start <= MAX_RANGE_SEEDS,
            "seed range {token} exceeds {MAX_RANGE_SEEDS} seeds"
        );
        return Ok((start..end)
            .map(|seed| SeedInfo {
                seed,
                source: token.to_string(),
            })
            .collect());
    }

    if let Ok(value) = token.parse::<i64>() {
        return Ok(vec![SeedInfo {
            seed: value.unsigned_abs(),
            source: token.to_string(),
        }]);
    }

    if let Ok(value) = token.parse::<u64>() {
        return Ok(vec![SeedInfo::from_numeric(value)]);
    }

    bail!("Unrecognized seed token: {token}");
}
