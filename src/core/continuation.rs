//! Locating where an interrupted utterance should resume.

/// Characters that end a sentence for resume purposes.
const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Byte length of the longest common prefix of `a` and `b`, on a char
/// boundary of both.
fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .take_while(|((_, ca), cb)| ca == cb)
        .last()
        .map(|((idx, ca), _)| idx + ca.len_utf8())
        .unwrap_or(0)
}

/// Text of `full` from the start of the sentence the listener was in when
/// playback stopped.
///
/// `heard` is normally a prefix of `full`. The resume point is the last
/// sentence terminator (`.`, `!`, `?`) followed by whitespace that lies
/// before the end of the common prefix. Returns an empty string when
/// everything was heard, and `full` itself when no such terminator exists.
pub fn find_continuation(full: &str, heard: &str) -> String {
    if full.is_empty() || heard == full {
        return String::new();
    }

    let offset = common_prefix_len(full, heard);
    if offset >= full.len() {
        return String::new();
    }

    let mut resume_at = None;
    let mut chars = full.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if idx >= offset {
            break;
        }
        if SENTENCE_TERMINATORS.contains(&ch)
            && let Some(&(_, next)) = chars.peek()
            && next.is_whitespace()
        {
            resume_at = Some(idx + ch.len_utf8());
        }
    }

    match resume_at {
        Some(at) => full[at..].trim_start().to_string(),
        None => full.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resumes_at_interrupted_sentence() {
        let full = "Once upon a time. There was a bear. He liked honey.";
        let heard = "Once upon a time. There was";
        assert_eq!(
            find_continuation(full, heard),
            "There was a bear. He liked honey."
        );
    }

    #[test]
    fn test_cut_in_first_sentence_resumes_from_start() {
        let full = "A scavenger discovers an artifact that threatens to reawaken a power. \
                    Hunted by a corporation, she must protect the secret.";
        let heard = "A scavenger discovers an artifact that threatens";
        assert_eq!(find_continuation(full, heard), full);
    }

    #[test]
    fn test_everything_heard() {
        assert_eq!(find_continuation("Hello there.", "Hello there."), "");
    }

    #[test]
    fn test_nothing_heard_without_terminator() {
        assert_eq!(find_continuation("Hello world", ""), "Hello world");
    }

    #[test]
    fn test_empty_full() {
        assert_eq!(find_continuation("", ""), "");
        assert_eq!(find_continuation("", "stale"), "");
    }

    #[test]
    fn test_heard_on_sentence_boundary() {
        let full = "First one! Second one? Third.";
        assert_eq!(find_continuation(full, "First one! "), "Second one? Third.");
    }

    #[test]
    fn test_terminator_without_whitespace_ignored() {
        let full = "Version 2.5 is out and it is fast";
        assert_eq!(find_continuation(full, "Version 2.5 is"), full);
    }

    #[test]
    fn test_divergent_heard_text() {
        let full = "Alpha. Beta gamma.";
        // heard diverges right after the first sentence
        assert_eq!(find_continuation(full, "Alpha. Bxxx"), "Beta gamma.");
    }

    #[test]
    fn test_heard_longer_than_full() {
        assert_eq!(find_continuation("Short.", "Short. and more"), "");
    }

    #[test]
    fn test_multibyte_text() {
        let full = "Ça va? Très bien. Merci à toi.";
        let heard = "Ça va? Très bien. Mer";
        assert_eq!(find_continuation(full, heard), "Merci à toi.");
    }

    #[test]
    fn test_result_is_suffix_of_full() {
        let cases = [
            ("A. B. C.", "A. B"),
            ("No stops here", "No"),
            ("Hi! There", "Hi! T"),
            ("x", ""),
        ];
        for (full, heard) in cases {
            let out = find_continuation(full, heard);
            assert!(full.ends_with(&out), "{out:?} is not a suffix of {full:?}");
        }
    }
}
