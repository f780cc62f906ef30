use unicode_normalization::UnicodeNormalization;

/// Placeholder used when sanitization strips every character from the input.
const EMPTY_ID_PLACEHOLDER: &str = "fragment";

/// Reduce arbitrary Unicode to an identifier that is legal both in the
/// vector index and in filesystem paths.
///
/// NFKD decomposition splits accented characters into base letter plus
/// combining mark; dropping the non-ASCII codepoints then keeps the base
/// letter (`Física` becomes `Fisica`). Anything left outside
/// `[A-Za-z0-9._-]` is mapped to `_`.
pub fn ascii_safe_id(text: &str) -> String {
    let sanitized: String = text
        .nfkd()
        .filter(char::is_ascii)
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        EMPTY_ID_PLACEHOLDER.to_string()
    } else {
        sanitized
    }
}

/// Deterministic record id for a fragment.
///
/// The decimal `sequence_index` suffix survives sanitization verbatim, so
/// two fragments of the same document can never collide. Distinct source
/// filenames that sanitize to the same prefix can; that is accepted rather
/// than special-cased.
pub fn fragment_id(source_file: &str, sequence_index: u64) -> String {
    ascii_safe_id(&format!("{source_file}_chunk_{sequence_index}"))
}

#[cfg(test)]
mod tests {
    use super::{ascii_safe_id, fragment_id};

    #[test]
    fn accents_are_stripped_to_base_letters() {
        assert_eq!(fragment_id("Física_I.pdf", 0), "Fisica_I.pdf_chunk_0");
        assert_eq!(fragment_id("Física_I.pdf", 1), "Fisica_I.pdf_chunk_1");
        assert_eq!(fragment_id("Física_I.pdf", 2), "Fisica_I.pdf_chunk_2");
    }

    #[test]
    fn unsafe_characters_become_underscores() {
        assert_eq!(ascii_safe_id("a b/c:d.pdf"), "a_b_c_d.pdf");
        assert_eq!(ascii_safe_id("notas (v2).pdf"), "notas__v2_.pdf");
    }

    #[test]
    fn output_is_always_storage_safe() {
        for input in ["汉字.pdf", "Grüße & Co", "  ", "émoji 🦀"] {
            let id = ascii_safe_id(input);
            assert!(!id.is_empty());
            assert!(
                id.chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-')),
                "unsafe output for {input:?}: {id}"
            );
        }
    }

    #[test]
    fn fully_non_ascii_input_falls_back_to_placeholder() {
        assert_eq!(ascii_safe_id("漢字"), "fragment");
    }

    #[test]
    fn ids_are_deterministic() {
        assert_eq!(fragment_id("apuntes.pdf", 7), fragment_id("apuntes.pdf", 7));
    }

    #[test]
    fn distinct_indices_never_collide() {
        let first = fragment_id("doc.pdf", 1);
        let second = fragment_id("doc.pdf", 12);
        assert_ne!(first, second);
    }
}
