//! Storage-safe keys for article identifiers.
//!
//! A guid is an arbitrary string (usually a URL), which is not a legal path
//! segment in the remote store.  [`storage_key`] maps it to URL-safe base64
//! without padding: alphabet `A-Z a-z 0-9 - _`, no `/`, no `=`.
//!
//! Every key already written remotely was produced by this function.
//! Changing the encoding orphans all existing visited/favorite marks.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

/// Encode a guid as a storage-safe key.
///
/// Pure function of the guid's UTF-8 bytes.  The empty guid encodes to the
/// empty string; callers never look it up or write it.
pub fn storage_key(guid: &str) -> String {
    URL_SAFE_NO_PAD.encode(guid.as_bytes())
}

/// Whether `key` only uses the storage-safe alphabet.
pub fn is_storage_safe(key: &str) -> bool {
    key.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::HashMap;

    #[test]
    fn known_vectors_match_url_safe_base64() {
        assert_eq!(storage_key("f"), "Zg");
        assert_eq!(storage_key("fo"), "Zm8");
        assert_eq!(storage_key("foo"), "Zm9v");
        // Standard base64 would give "76+/".
        assert_eq!(storage_key("\u{fbff}"), "76-_");
    }

    #[test]
    fn url_guid_contains_no_path_separator() {
        let key = storage_key("https://wiadomosci.gazeta.pl/wiadomosci/7,114883,31000000.html?x=1");
        assert!(is_storage_safe(&key), "{key}");
        assert!(!key.contains('/'));
        assert!(!key.contains('='));
    }

    #[test]
    fn empty_guid_encodes_to_empty_key() {
        assert_eq!(storage_key(""), "");
    }

    #[test]
    fn encoding_is_deterministic() {
        let guid = "urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a";
        assert_eq!(storage_key(guid), storage_key(guid));
    }

    #[test]
    fn unicode_edge_cases_are_safe_and_distinct() {
        let guids = [
            "é",
            "e\u{301}", // same glyph, different bytes
            "😀",
            "\u{0}",
            "\u{feff}guid",
            "guid\u{feff}",
            "ﬁ",
            "fi",
            " ",
            "  ",
        ];
        let mut seen = HashMap::new();
        for guid in guids {
            let key = storage_key(guid);
            assert!(is_storage_safe(&key), "{guid:?} -> {key}");
            if let Some(previous) = seen.insert(key.clone(), guid) {
                panic!("{previous:?} and {guid:?} both encode to {key}");
            }
        }
    }

    #[test]
    fn randomized_corpus_is_safe_and_collision_free() {
        let mut rng = rand::thread_rng();
        let mut seen: HashMap<String, String> = HashMap::new();

        for _ in 0..20_000 {
            let len = rng.gen_range(1..48);
            let guid: String = (0..len).map(|_| rng.gen::<char>()).collect();
            let key = storage_key(&guid);

            assert!(is_storage_safe(&key), "{guid:?} -> {key}");
            if let Some(previous) = seen.insert(key.clone(), guid.clone()) {
                assert_eq!(previous, guid, "collision on {key}");
            }
        }
    }
}
