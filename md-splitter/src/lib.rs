//! Splits Markdown text into heading-delimited chunks.
//!
//! This is a from-scratch, dependency-free reimplementation of the
//! heading-chunking idea found in the teacher's block-based text
//! segmenters: walk the document once, track a heading stack, and cut a
//! new chunk every time the stack changes. Unlike those segmenters this
//! one never re-merges or re-scores cuts — headings are the only
//! boundary, by design (spec §4.2).
//!
//! Malformed or absent headings are not an error: a document with no
//! heading at all comes back as a single chunk, and lines that merely
//! *look* like headings but fail the ATX/Setext grammar are left as
//! ordinary body text.

/// One chunk emitted by [`split`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitChunk {
    /// Trimmed, non-empty chunk body.
    pub content: String,
    /// Heading titles enclosing this chunk, root to leaf, optionally
    /// prefixed by the source file's base name.
    pub title_chain: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct HeadingEvent {
    /// Index of the first line of the heading (the ATX line, or the
    /// Setext title line).
    start_line: usize,
    /// Index one past the heading's last line (exclusive), i.e. where the
    /// chunk body begins.
    body_start_line: usize,
    level: u8,
}

/// Split `text` into chunks at Markdown headings.
///
/// `file_name` is optional; when given, its base name is prefixed to
/// every chunk's `title_chain`, matching how a search result should read
/// ("report.md > Introduction > Background") even for a document whose
/// first heading is below the top level.
pub fn split(text: &str, file_name: Option<&str>) -> Vec<SplitChunk> {
    let normalized = normalize_newlines(text);
    let lines: Vec<&str> = normalized.split('\n').collect();

    let headings = find_headings(&lines);
    let prefix = file_name.and_then(base_name).into_iter().collect::<Vec<_>>();

    if headings.is_empty() {
        let body = normalized.trim();
        if body.is_empty() {
            return Vec::new();
        }
        return vec![SplitChunk {
            content: body.to_string(),
            title_chain: prefix,
        }];
    }

    let mut chunks = Vec::with_capacity(headings.len() + 1);

    // Preamble: any content before the first heading becomes its own
    // chunk at the root of the title chain (just the file prefix, if any).
    let first = &headings[0];
    if first.start_line > 0 {
        let body = lines[0..first.start_line].join("\n");
        let body = body.trim();
        if !body.is_empty() {
            chunks.push(SplitChunk {
                content: body.to_string(),
                title_chain: prefix.clone(),
            });
        }
    }

    let mut stack: Vec<String> = Vec::new();
    for (i, h) in headings.iter().enumerate() {
        let title = heading_title(&lines, h);
        if (h.level as usize) <= stack.len() {
            stack.truncate(h.level as usize - 1);
        }
        stack.push(title);

        let end_line = headings.get(i + 1).map(|n| n.start_line).unwrap_or(lines.len());
        let body = lines[h.body_start_line..end_line].join("\n");
        let body = body.trim();
        if body.is_empty() {
            continue;
        }

        let mut title_chain = prefix.clone();
        title_chain.extend(stack.iter().cloned());
        chunks.push(SplitChunk {
            content: body.to_string(),
            title_chain,
        });
    }

    chunks
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn base_name(file_name: &str) -> Option<String> {
    let trimmed = file_name.trim();
    if trimmed.is_empty() {
        return None;
    }
    let name = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn find_headings(lines: &[&str]) -> Vec<HeadingEvent> {
    let mut events = Vec::new();
    let mut i = 0usize;
    while i < lines.len() {
        if let Some(level) = atx_level(lines[i]) {
            events.push(HeadingEvent {
                start_line: i,
                body_start_line: i + 1,
                level,
            });
            i += 1;
            continue;
        }
        if i + 1 < lines.len() {
            if let Some(level) = setext_level(lines[i], lines[i + 1]) {
                events.push(HeadingEvent {
                    start_line: i,
                    body_start_line: i + 2,
                    level,
                });
                i += 2;
                continue;
            }
        }
        i += 1;
    }
    events
}

/// `^#{1,6}\s+(title)\s*#*\s*$`
fn atx_level(line: &str) -> Option<u8> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(|c: char| c.is_whitespace()) {
        return None;
    }
    Some(hashes as u8)
}

/// Extracts the trimmed title text for a heading event, stripping
/// trailing closing `#` runs for ATX headings.
fn heading_title(lines: &[&str], h: &HeadingEvent) -> String {
    let raw = lines[h.start_line];
    if h.body_start_line == h.start_line + 1 && raw.trim_start().starts_with('#') {
        let hashes = raw.chars().take_while(|&c| c == '#').count();
        let mut title = raw[hashes..].trim();
        title = title.trim_end_matches('#').trim_end();
        return title.to_string();
    }
    raw.trim().to_string()
}

/// A non-blank, non-`#` line followed by a line of `=+` (level 1) or
/// `-+` with length >= 3 (level 2).
fn setext_level(title_line: &str, underline: &str) -> Option<u8> {
    let trimmed_title = title_line.trim();
    if trimmed_title.is_empty() || trimmed_title.starts_with('#') {
        return None;
    }
    let trimmed_underline = underline.trim_end();
    if trimmed_underline.is_empty() {
        return None;
    }
    if trimmed_underline.chars().all(|c| c == '=') {
        return Some(1);
    }
    if trimmed_underline.chars().all(|c| c == '-') && trimmed_underline.len() >= 3 {
        return Some(2);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_heading_yields_single_chunk() {
        let out = split("just some text\nwith two lines", None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "just some text\nwith two lines");
        assert!(out[0].title_chain.is_empty());
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        assert!(split("", None).is_empty());
        assert!(split("   \n\n  ", None).is_empty());
    }

    #[test]
    fn atx_headings_build_title_chain() {
        let text = "# Title\n\nintro\n\n## Section A\n\nbody a\n\n### Sub A.1\n\nbody a1\n\n## Section B\n\nbody b\n";
        let out = split(text, None);
        let chains: Vec<Vec<String>> = out.iter().map(|c| c.title_chain.clone()).collect();
        assert_eq!(chains[0], vec!["Title"]);
        assert_eq!(chains[1], vec!["Title", "Section A"]);
        assert_eq!(chains[2], vec!["Title", "Section A", "Sub A.1"]);
        assert_eq!(chains[3], vec!["Title", "Section B"]);
        assert!(out[1].content.contains("body a"));
        assert!(out[3].content.contains("body b"));
    }

    #[test]
    fn sibling_heading_truncates_stack() {
        let text = "# A\n## B\ntext b\n## C\ntext c\n";
        let out = split(text, None);
        let chains: Vec<Vec<String>> = out.iter().map(|c| c.title_chain.clone()).collect();
        assert_eq!(chains, vec![vec!["A", "B"], vec!["A", "C"]]);
    }

    #[test]
    fn jump_to_shallower_level_truncates_multiple() {
        let text = "# A\n## B\n### C\ntext\n# D\ntext d\n";
        let out = split(text, None);
        let chains: Vec<Vec<String>> = out.iter().map(|c| c.title_chain.clone()).collect();
        assert_eq!(chains, vec![vec!["A", "B", "C"], vec!["D"]]);
    }

    #[test]
    fn setext_headings_detected() {
        let text = "Title One\n=========\nbody one\n\nTitle Two\n---------\nbody two\n";
        let out = split(text, None);
        let chains: Vec<Vec<String>> = out.iter().map(|c| c.title_chain.clone()).collect();
        assert_eq!(chains, vec![vec!["Title One"], vec!["Title One", "Title Two"]]);
    }

    #[test]
    fn short_dash_run_is_not_setext() {
        // "--" is too short to be a level-2 underline; no heading detected.
        let text = "Not a title\n--\nmore text\n";
        let out = split(text, None);
        assert_eq!(out.len(), 1);
        assert!(out[0].title_chain.is_empty());
    }

    #[test]
    fn trailing_closing_hashes_are_stripped() {
        let text = "## Section ##\nbody\n";
        let out = split(text, None);
        assert_eq!(out[0].title_chain, vec!["Section"]);
    }

    #[test]
    fn file_name_prefixes_title_chain() {
        let text = "# Title\nbody\n";
        let out = split(text, Some("docs/report.md"));
        assert_eq!(out[0].title_chain, vec!["report.md", "Title"]);
    }

    #[test]
    fn preamble_before_first_heading_is_its_own_chunk() {
        let text = "intro text\n\n# Title\nbody\n";
        let out = split(text, Some("f.md"));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "intro text");
        assert_eq!(out[0].title_chain, vec!["f.md"]);
        assert_eq!(out[1].title_chain, vec!["f.md", "Title"]);
    }

    #[test]
    fn empty_heading_bodies_are_discarded() {
        let text = "# A\n## B\n## C\ntext c\n";
        let out = split(text, None);
        // "B" has no body before "C" starts, so it's dropped entirely.
        let chains: Vec<Vec<String>> = out.iter().map(|c| c.title_chain.clone()).collect();
        assert_eq!(chains, vec![vec!["A", "C"]]);
    }

    #[test]
    fn crlf_is_normalized() {
        let text = "# A\r\nbody\r\n## B\r\nbody2\r\n";
        let out = split(text, None);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "body");
        assert_eq!(out[1].content, "body2");
    }

    proptest::proptest! {
        #[test]
        fn concatenation_reconstructs_normalized_input(lines in proptest::collection::vec("[a-zA-Z0-9 ]{0,20}", 0..12)) {
            let text = lines.join("\n");
            let out = split(&text, None);
            let rebuilt: String = out.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n");
            // Every character that appears in a chunk body also appears in
            // the source text, in order (P5: reconstruction up to boundary
            // whitespace trimming).
            let mut src_iter = text.chars().filter(|c| !c.is_whitespace());
            for ch in rebuilt.chars().filter(|c| !c.is_whitespace()) {
                let mut found = false;
                for next in src_iter.by_ref() {
                    if next == ch { found = true; break; }
                }
                prop_assert!(found, "chunk content not found in order within source");
            }
        }
    }
}
