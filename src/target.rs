//! Turning raw input lines into capture targets
//!
//! A target carries the address handed to the browser and the identifier
//! used as its directory name under the output root.

use crate::{validate_url, CaptureError};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

const DEFAULT_SCHEME: &str = "http://";
const RECOGNIZED_SCHEMES: [&str; 2] = ["http://", "https://"];

/// One web address to capture plus its filesystem identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureTarget {
    raw_input: String,
    address: String,
    identifier: String,
}

impl CaptureTarget {
    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Normalizes a single line without collision tracking.
///
/// Fails only on empty or whitespace-only input.
pub fn normalize(raw_line: &str) -> Result<CaptureTarget, CaptureError> {
    let raw = raw_line.trim();
    if raw.is_empty() {
        return Err(CaptureError::EmptyInput);
    }

    let address = normalize_address(raw);
    if validate_url(&address).is_err() {
        warn!("Target {raw:?} does not parse as a URL, capturing anyway");
    }

    Ok(CaptureTarget {
        raw_input: raw.to_string(),
        address,
        identifier: derive_identifier(raw),
    })
}

/// Prepends `http://` unless the input already starts with a recognized
/// scheme. Never guesses `https`.
pub fn normalize_address(raw: &str) -> String {
    let has_scheme = RECOGNIZED_SCHEMES.iter().any(|scheme| {
        raw.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    });

    if has_scheme {
        raw.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{raw}")
    }
}

/// Replaces every character outside `[A-Za-z0-9_.-]` with `_`.
///
/// Not injective: `a/b` and `a?b` both become `a_b`.
pub fn derive_identifier(raw: &str) -> String {
    let identifier: String = raw
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '_' | '.' | '-' => c,
            _ => '_',
        })
        .collect();

    // "." and ".." would resolve outside the target's own directory
    if identifier.chars().all(|c| c == '.') {
        identifier.replace('.', "_")
    } else {
        identifier
    }
}

/// Normalizer that remembers issued identifiers for one batch.
///
/// With disambiguation on, the second and later targets mapping to an
/// identifier already in use get `_2`, `_3`, ... appended, so the outcome
/// depends only on input order.
#[derive(Debug, Default)]
pub struct TargetNormalizer {
    disambiguate: bool,
    issued: HashMap<String, usize>,
}

impl TargetNormalizer {
    pub fn new(disambiguate: bool) -> Self {
        Self {
            disambiguate,
            issued: HashMap::new(),
        }
    }

    pub fn normalize(&mut self, raw_line: &str) -> Result<CaptureTarget, CaptureError> {
        let mut target = normalize(raw_line)?;

        let seen = self.issued.entry(target.identifier.clone()).or_insert(0);
        *seen += 1;

        if *seen > 1 {
            if self.disambiguate {
                let base = target.identifier.clone();
                let mut suffix = *seen;
                let mut candidate = format!("{base}_{suffix}");
                while self.issued.contains_key(&candidate) {
                    suffix += 1;
                    candidate = format!("{base}_{suffix}");
                }
                debug!("Identifier {base} already used, assigning {candidate}");
                self.issued.insert(candidate.clone(), 1);
                target.identifier = candidate;
            } else {
                warn!(
                    "Identifier {} collides with an earlier target, its output will be overwritten",
                    target.identifier
                );
            }
        }

        Ok(target)
    }

    /// Normalizes every non-blank line, preserving input order.
    pub fn normalize_lines<'a, I>(&mut self, lines: I) -> Vec<CaptureTarget>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| self.normalize(line).ok())
            .collect()
    }
}
