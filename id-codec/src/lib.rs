//! Deterministic, content-addressable identifiers.
//!
//! Every function here is pure: same input, same output, forever. That's
//! what makes re-sync idempotent (spec P2) and cross-store reconciliation
//! decidable by simple set comparison (spec P1) rather than by tracking
//! history.

use chunk_model::{DocId, PointId};
use sha2::{Digest, Sha256};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdCodecError {
    #[error("malformed point id: {0:?}")]
    MalformedPointId(String),
}

/// `docId = hex(SHA-256(bytes))`. Identical content always yields the same
/// id, which is what lets `ImportService::uploadFile` detect duplicate
/// uploads without a separate lookup table.
pub fn doc_id(bytes: &[u8]) -> DocId {
    DocId(hex_sha256(bytes))
}

/// `pointId = docId#chunkIndex`. `chunk_index` is a dense, 0-based
/// position within the document.
pub fn point_id(doc_id: &DocId, chunk_index: u32) -> PointId {
    PointId(format!("{}#{}", doc_id.0, chunk_index))
}

/// Inverse of [`point_id`]. Fails if the string isn't `<docId>#<index>`
/// with a valid non-negative decimal index.
pub fn parse_point_id(s: &str) -> Result<(DocId, u32), IdCodecError> {
    let (doc, idx) = s
        .rsplit_once('#')
        .ok_or_else(|| IdCodecError::MalformedPointId(s.to_string()))?;
    if doc.is_empty() {
        return Err(IdCodecError::MalformedPointId(s.to_string()));
    }
    let index: u32 = idx
        .parse()
        .map_err(|_| IdCodecError::MalformedPointId(s.to_string()))?;
    Ok((DocId(doc.to_string()), index))
}

/// `contentHash = hex(SHA-256(normalize(text)))`, where normalization is
/// Unicode NFC followed by CRLF/CR -> LF. Two chunks with different
/// whitespace/line-ending conventions but equal normalized text hash the
/// same, which keeps re-sync from treating a whitespace-only re-save as a
/// content change.
pub fn content_hash(text: &str) -> String {
    let normalized = normalize_text(text);
    hex_sha256(normalized.as_bytes())
}

/// Normalize text the same way [`content_hash`] does, for callers (the
/// splitter, tests) that need to compare normalized text directly.
pub fn normalize_text(text: &str) -> String {
    let lf = text.replace("\r\n", "\n").replace('\r', "\n");
    lf.nfc().collect::<String>()
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_is_deterministic() {
        let a = doc_id(b"hello world");
        let b = doc_id(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn doc_id_differs_on_content() {
        assert_ne!(doc_id(b"a"), doc_id(b"b"));
    }

    #[test]
    fn point_id_round_trips() {
        let doc = doc_id(b"content");
        let pid = point_id(&doc, 3);
        assert_eq!(pid.0, format!("{}#3", doc.0));
        let (parsed_doc, idx) = parse_point_id(&pid.0).unwrap();
        assert_eq!(parsed_doc, doc);
        assert_eq!(idx, 3);
    }

    #[test]
    fn parse_point_id_rejects_malformed() {
        assert!(parse_point_id("no-hash-here").is_err());
        assert!(parse_point_id("#5").is_err());
        assert!(parse_point_id("doc#not-a-number").is_err());
    }

    #[test]
    fn parse_point_id_handles_hash_in_doc_id() {
        // doc ids are hex and never contain '#', but rsplit_once keeps this
        // correct even if that ever changes.
        let (doc, idx) = parse_point_id("abc#def#7").unwrap();
        assert_eq!(doc.0, "abc#def");
        assert_eq!(idx, 7);
    }

    #[test]
    fn content_hash_normalizes_newlines() {
        let crlf = content_hash("line one\r\nline two");
        let lf = content_hash("line one\nline two");
        assert_eq!(crlf, lf);
    }

    #[test]
    fn content_hash_normalizes_nfc() {
        // "e" + combining acute vs precomposed "é" should hash the same.
        let decomposed = "cafe\u{0301}";
        let precomposed = "café";
        assert_eq!(content_hash(decomposed), content_hash(precomposed));
    }
}
