//! Tag handling.
//!
//! A file's tags are a single comma-separated string such as `"work, ideas"`.
//! The string is stored exactly as the user typed it: order, case and
//! whitespace are not normalized at rest. Everything here works on the
//! read side, splitting and trimming on demand. There is no persisted tag
//! index; aggregation is recomputed from the records every time.

use crate::model::{parse_frontmatter, MarkdownFile};
use std::collections::BTreeSet;

/// Splits a raw tags string into trimmed, non-empty tokens, in order.
pub fn tag_tokens(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// Exact, case-insensitive match of `tag` against the tokens of `raw`.
pub fn has_tag(raw: &str, tag: &str) -> bool {
    let wanted = tag.trim().to_lowercase();
    tag_tokens(raw).any(|t| t.to_lowercase() == wanted)
}

/// All distinct tokens across `files`, sorted.
pub fn collect_tags<'a, I>(files: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a MarkdownFile>,
{
    let set: BTreeSet<String> = files
        .into_iter()
        .flat_map(|f| tag_tokens(&f.tags))
        .map(str::to_string)
        .collect();
    set.into_iter().collect()
}

/// Joins tag names back into the stored representation.
pub fn format_tags<I, S>(tags: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Tags mentioned in a document: `#hashtags` in the text, then the
/// frontmatter `tags` field. Distinct, in order of first appearance.
pub fn extract_tags(content: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let (frontmatter, _) = parse_frontmatter(content);
    for tag in hashtags(content).chain(frontmatter.tags()) {
        let tag = tag.trim();
        if !tag.is_empty() && !found.iter().any(|t| t == tag) {
            found.push(tag.to_string());
        }
    }
    found
}

/// [`extract_tags`] in the stored comma-separated form.
pub fn extract_tags_string(content: &str) -> String {
    format_tags(extract_tags(content))
}

fn hashtags(content: &str) -> impl Iterator<Item = String> + '_ {
    let is_tag_char = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
    content.match_indices('#').filter_map(move |(at, _)| {
        let rest = &content[at + 1..];
        let end = rest.find(|c: char| !is_tag_char(c)).unwrap_or(rest.len());
        (end > 0).then(|| rest[..end].to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_with_tags(tags: &str) -> MarkdownFile {
        MarkdownFile {
            id: tags.to_string(),
            content: String::new(),
            created_at: 0,
            updated_at: 0,
            visited_at: 0,
            title: String::new(),
            tags: tags.to_string(),
        }
    }

    #[test]
    fn tokens_are_trimmed_and_skip_empties() {
        let tokens: Vec<_> = tag_tokens(" a, b ,, ,c ").collect();
        assert_eq!(tokens, vec!["a", "b", "c"]);
        assert_eq!(tag_tokens("").count(), 0);
    }

    #[test]
    fn has_tag_is_exact_and_case_insensitive() {
        assert!(has_tag("Work, ideas", "work"));
        assert!(has_tag("Work, ideas", " IDEAS "));
        assert!(!has_tag("workshop", "work"));
        assert!(!has_tag("", "work"));
    }

    #[test]
    fn collect_tags_dedupes_and_sorts() {
        let files = [file_with_tags("a, b ,a")];
        assert_eq!(collect_tags(&files), vec!["a", "b"]);

        let files = [file_with_tags("zeta"), file_with_tags("alpha, zeta")];
        assert_eq!(collect_tags(&files), vec!["alpha", "zeta"]);
    }

    #[test]
    fn format_tags_joins_with_comma_space() {
        assert_eq!(format_tags(["a", " b ", ""]), "a, b");
        assert_eq!(format_tags(Vec::<String>::new()), "");
    }

    #[test]
    fn extract_tags_reads_hashtags_and_frontmatter() {
        let content = "---\ntags: [travel, work]\n---\n# Trip\n\n#travel notes for #q3-plan and #q3-plan again";
        assert_eq!(extract_tags(content), vec!["travel", "q3-plan", "work"]);
        assert_eq!(extract_tags_string(content), "travel, q3-plan, work");
    }

    #[test]
    fn extract_tags_skips_headings_and_bare_hashes() {
        assert!(extract_tags("# Title\n## Sub\nprice # 5").is_empty());
        assert_eq!(extract_tags("---\ntags: a, , b\n---\n"), vec!["a", "b"]);
        assert_eq!(extract_tags_string("no tags here"), "");
    }
}
