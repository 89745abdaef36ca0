//! Heuristic message-type inference for blobs with no bound type.
//!
//! Given a descriptor and raw bytes, the engine tries every candidate
//! message type in the catalog's stored (sorted) order and returns the
//! first one that validates. A candidate validates when:
//!
//! 1. the bytes decode successfully against the candidate schema,
//! 2. at least one known field is populated, and
//! 3. re-encoding the decoded message yields no more than twice the
//!    input length.
//!
//! The third check exists because a permissive decoder can "successfully"
//! parse arbitrary bytes against a loosely-typed schema; the length-ratio
//! bound is a cheap rejection of spurious matches.
//!
//! First-match semantics are the compatibility default; ties between
//! equally-valid candidates are resolved by catalog order, not by any
//! quality ranking. [`InferenceMode::BestMatch`] is an opt-in stricter
//! mode that scores every validating candidate instead.

use crate::catalog::Descriptor;
use crate::decode;
use crate::error::{Error, Result};
use prost::Message as _;
use tracing::{debug, trace};

/// Upper bound on the re-encoded/input length ratio for a valid candidate
pub const MAX_REENCODE_RATIO: usize = 2;

/// Candidate selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferenceMode {
    /// Return the first candidate that validates, in catalog order
    #[default]
    FirstMatch,
    /// Score every validating candidate (populated field count, then
    /// exact re-encode byte-equality) and return the best; ties resolve
    /// to catalog order
    BestMatch,
}

/// Message-type inference engine
#[derive(Debug, Clone, Default)]
pub struct TypeInferenceEngine {
    mode: InferenceMode,
}

/// How well a candidate type fit the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Score {
    populated: usize,
    exact_reencode: bool,
}

impl TypeInferenceEngine {
    /// Creates an engine with first-match semantics
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with the given selection mode
    pub fn with_mode(mode: InferenceMode) -> Self {
        Self { mode }
    }

    /// The engine's selection mode
    pub fn mode(&self) -> InferenceMode {
        self.mode
    }

    /// Infer the message type of `data` among the descriptor's types.
    ///
    /// Returns the fully-qualified name of the matched type, or `None`
    /// if no candidate validates.
    pub fn infer(&self, descriptor: &Descriptor, data: &[u8]) -> Option<String> {
        let mut best: Option<(String, Score)> = None;

        for type_name in descriptor.message_type_names() {
            let Some(schema) = descriptor.lookup(type_name) else {
                continue;
            };

            let Some(score) = validate_candidate(&schema, data) else {
                continue;
            };

            trace!(
                "candidate {} validated ({} fields populated, exact: {})",
                type_name,
                score.populated,
                score.exact_reencode
            );

            match self.mode {
                InferenceMode::FirstMatch => {
                    debug!("inferred {} (first match)", type_name);
                    return Some(type_name.clone());
                }
                InferenceMode::BestMatch => {
                    let better = match &best {
                        None => true,
                        Some((_, current)) => beats(score, *current),
                    };
                    if better {
                        best = Some((type_name.clone(), score));
                    }
                }
            }
        }

        if let Some((type_name, _)) = best {
            debug!("inferred {} (best match)", type_name);
            return Some(type_name);
        }

        debug!(
            "no type in descriptor '{}' matched {} input bytes",
            descriptor.name(),
            data.len()
        );
        None
    }

    /// Like [`infer`](Self::infer) but failing with
    /// [`Error::NoInferenceMatch`] when no candidate validates.
    pub fn infer_strict(&self, descriptor: &Descriptor, data: &[u8]) -> Result<String> {
        self.infer(descriptor, data)
            .ok_or_else(|| Error::no_inference_match(descriptor.name()))
    }
}

/// Strictly-better comparison: populated count first, then exactness
fn beats(candidate: Score, current: Score) -> bool {
    (candidate.populated, candidate.exact_reencode) > (current.populated, current.exact_reencode)
}

/// Run the three validation checks against one candidate schema
fn validate_candidate(
    schema: &prost_reflect::MessageDescriptor,
    data: &[u8],
) -> Option<Score> {
    let message = decode::decode_dynamic(schema, data).ok()?;

    let populated = message.fields().count();
    if populated == 0 {
        return None;
    }

    let reencoded = message.encode_to_vec();
    if reencoded.len() > data.len().saturating_mul(MAX_REENCODE_RATIO) {
        return None;
    }

    Some(Score {
        populated,
        exact_reencode: reencoded == data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Descriptor;
    use crate::testutil::descriptor_set_bytes;
    use pretty_assertions::assert_eq;

    fn load() -> Descriptor {
        Descriptor::load(descriptor_set_bytes(), "test").unwrap()
    }

    #[test]
    fn test_first_match_is_catalog_order() {
        let descriptor = load();
        // Field 1 varint 150: valid under MsgAlpha (uint64), MsgBeta
        // (uint64), and MsgKinds (sint32). MsgAlpha sorts first and wins,
        // regardless of any "better" candidate later in the catalog.
        let engine = TypeInferenceEngine::new();
        assert_eq!(
            engine.infer(&descriptor, &[0x08, 0x96, 0x01]),
            Some("com.example.MsgAlpha".to_string())
        );
    }

    #[test]
    fn test_rejects_empty_message() {
        let descriptor = load();
        let engine = TypeInferenceEngine::new();
        // An empty buffer decodes under every type but populates nothing
        assert_eq!(engine.infer(&descriptor, &[]), None);
    }

    #[test]
    fn test_rejects_unknown_field_only_parses() {
        let descriptor = load();
        let engine = TypeInferenceEngine::new();
        // Field 99 exists in no test schema; every decode succeeds but
        // populates zero known fields
        let data = [0x98, 0x06, 0x01]; // field 99, varint 1
        assert_eq!(engine.infer(&descriptor, &data), None);
    }

    #[test]
    fn test_infers_string_message() {
        let descriptor = load();
        let engine = TypeInferenceEngine::new();
        // A length-delimited field 1 rejects every varint-typed candidate;
        // MsgText is the first remaining type in catalog order
        let inferred = engine.infer(&descriptor, b"\x0a\x05hello");
        assert_eq!(inferred, Some("com.example.MsgText".to_string()));
    }

    #[test]
    fn test_best_match_prefers_more_populated() {
        let descriptor = load();
        // Two fields populated under MsgKinds (delta + flag); the
        // all-varint single-field types also validate but populate less
        let data = [0x08, 0x05, 0x10, 0x01];
        let first = TypeInferenceEngine::new().infer(&descriptor, &data);
        assert_eq!(first, Some("com.example.MsgAlpha".to_string()));

        let best = TypeInferenceEngine::with_mode(InferenceMode::BestMatch).infer(&descriptor, &data);
        assert_eq!(best, Some("com.example.MsgKinds".to_string()));
    }

    #[test]
    fn test_infer_strict_error() {
        let descriptor = load();
        let engine = TypeInferenceEngine::new();
        let err = engine.infer_strict(&descriptor, &[]).unwrap_err();
        assert!(matches!(err, Error::NoInferenceMatch { .. }));
        assert!(err.to_string().contains("test"));
    }
}
