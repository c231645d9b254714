use crate::document::Document;
use crate::fusion::MatchType;

/// Shown when a document has no body to explain a hit with.
pub const NO_SNIPPET: &str = "No snippet available";

/// Characters kept on each side of a highlighted match.
pub const EXPLAIN_CONTEXT_CHARS: usize = 60;

/// Maximum length of a highlighted explain snippet.
pub const EXPLAIN_MAX_CHARS: usize = 180;

/// Maximum length of a lead-paragraph snippet.
pub const LEAD_MAX_CHARS: usize = 160;

/// One-line reason a document was returned for `query`.
///
/// Keyword and hybrid hits show the first case-insensitive occurrence of
/// the query in the body with the match in brackets. Semantic hits, and
/// keyword hits whose text match came from elsewhere, show the lead
/// paragraph instead.
pub fn explain_snippet(
    doc: &Document,
    query: &str,
    match_type: MatchType,
) -> String {
    if doc.body.trim().is_empty() {
        return NO_SNIPPET.to_string();
    }

    if match_type != MatchType::Semantic {
        if let Some(snippet) = highlight(&doc.body, query) {
            return snippet;
        }
    }

    let lead = if doc.lead.trim().is_empty() {
        first_paragraph(&doc.body)
    } else {
        doc.lead.as_str()
    };
    truncate_chars(&collapse_whitespace(lead), LEAD_MAX_CHARS)
}

/// Bracket the first occurrence of `query` (or failing that, of any of
/// its words) with surrounding context.
fn highlight(body: &str, query: &str) -> Option<String> {
    let chars: Vec<char> = body.chars().collect();
    let query = query.trim();
    let found = std::iter::once(query)
        .chain(query.split_whitespace())
        .filter(|needle| !needle.is_empty())
        .find_map(|needle| {
            let needle: Vec<char> = needle.chars().collect();
            find_ignore_case(&chars, &needle).map(|at| (at, needle.len()))
        });
    let (at, len) = found?;

    let start = at.saturating_sub(EXPLAIN_CONTEXT_CHARS);
    let end = (at + len + EXPLAIN_CONTEXT_CHARS).min(chars.len());
    let text = |range: std::ops::Range<usize>| -> String {
        chars[range].iter().collect()
    };

    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str("...");
    }
    snippet.push_str(&text(start..at));
    snippet.push('[');
    snippet.push_str(&text(at..at + len));
    snippet.push(']');
    snippet.push_str(&text(at + len..end));
    if end < chars.len() {
        snippet.push_str("...");
    }

    Some(truncate_chars(&collapse_whitespace(&snippet), EXPLAIN_MAX_CHARS))
}

fn find_ignore_case(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    let same = |a: &char, b: &char| a.to_lowercase().eq(b.to_lowercase());
    (0..=haystack.len() - needle.len()).find(|&i| {
        haystack[i..i + needle.len()]
            .iter()
            .zip(needle)
            .all(|(a, b)| same(a, b))
    })
}

/// The first paragraph of `text` that is not a heading.
pub fn first_paragraph(text: &str) -> &str {
    text.split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty() && !p.starts_with('#'))
        .unwrap_or("")
}

/// Replace every run of whitespace with a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to at most `max` characters, ending in `...` when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Document {
        Document::new("a.md").with_body(body)
    }

    #[test]
    fn highlights_the_match() {
        let d = doc(
            "Sprint planning includes a meeting recap and action list for \
             this week.",
        );
        let snippet = explain_snippet(&d, "MEETING", MatchType::Exact);
        assert!(snippet.contains("[meeting]"), "{snippet}");
        assert!(!snippet.starts_with("..."));
    }

    #[test]
    fn empty_body_has_placeholder() {
        let snippet = explain_snippet(&doc("  "), "x", MatchType::Hybrid);
        assert_eq!(snippet, NO_SNIPPET);
    }

    #[test]
    fn long_context_is_windowed() {
        let body =
            format!("{} needle {}", "a ".repeat(200), "b ".repeat(200));
        let snippet =
            explain_snippet(&doc(&body), "needle", MatchType::Exact);
        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
        assert!(snippet.contains("[needle]"));
        assert!(snippet.chars().count() <= EXPLAIN_MAX_CHARS);
    }

    #[test]
    fn semantic_hits_use_the_lead() {
        let body = "semantic context about architecture decisions and \
                    trade-offs. "
            .repeat(8);
        let snippet =
            explain_snippet(&doc(&body), "architecture", MatchType::Semantic);
        assert!(snippet.chars().count() <= LEAD_MAX_CHARS);
        assert!(snippet.ends_with("..."));
        assert!(!snippet.contains('['));
    }

    #[test]
    fn stored_lead_wins_over_body() {
        let d = doc("# Title\n\nBody paragraph.").with_lead("The lead.");
        assert_eq!(explain_snippet(&d, "zzz", MatchType::Exact), "The lead.");
        let d = doc("# Title\n\nBody paragraph.\n\nMore.");
        assert_eq!(
            explain_snippet(&d, "zzz", MatchType::Semantic),
            "Body paragraph."
        );
    }

    #[test]
    fn first_paragraph_skips_headings() {
        let text = "# H\n\n## Sub\n\nText\nmore\n\nNext";
        assert_eq!(first_paragraph(text), "Text\nmore");
        assert_eq!(first_paragraph(""), "");
    }

    #[test]
    fn truncation_counts_chars() {
        assert_eq!(truncate_chars("héllo", 5), "héllo");
        assert_eq!(truncate_chars("héllo wörld", 8), "héllo...");
    }
}
