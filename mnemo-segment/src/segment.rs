//! Adaptive segmentation of unstructured text into independent memory
//! fragments.
//!
//! This module answers two questions about a block of raw text:
//!
//! 1. How much distinct content does it hold? ([`Segmenter::richness`], a
//!    1–10 heuristic over length, paragraph count, list markers, headers and
//!    distinct capitalized phrases.)
//! 2. Where should it be cut? ([`Segmenter::segment`], a three-tier fallback:
//!    structural line scan, paragraph grouping, single fragment.)
//!
//! The richness score also sizes the output: callers that do not pass
//! explicit bounds derive them with [`fragment_bounds`], which widens the
//! score by two in each direction.
//!
//! The structural tier respects fenced code blocks: a line containing a
//! triple-backtick delimiter toggles fence state, and lines inside a fence
//! never start a new section, even when they look like headings.
//!
//! # Usage
//!
//! ```
//! use mnemo_segment::{Segmenter, fragment_bounds};
//!
//! let segmenter = Segmenter::new();
//! let content = "# Notes\n    a reasonably long indented body line for the first part\n# More\n    and a second indented body line that also carries enough text";
//!
//! let richness = segmenter.richness(content);
//! let (min, max) = fragment_bounds(richness);
//! let fragments = segmenter.segment(content, min, max);
//!
//! assert!(!fragments.is_empty());
//! assert!(fragments.len() <= max);
//! ```
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

/// Sections shorter than this (in characters) are discarded by the
/// structural tier.
const MIN_SECTION_CHARS: usize = 50;

/// Paragraphs must be longer than this to participate in grouping.
const MIN_PARAGRAPH_CHARS: usize = 30;

/// Trimmed content at or below this length produces no fragments at all.
const MIN_FRAGMENT_CHARS: usize = 20;

/// One unit of text produced by segmentation, destined to become one stored
/// record.
#[derive(Debug, Clone, Serialize)]
pub struct Fragment {
    /// The position of this fragment within the segmentation output
    /// (0-indexed).
    pub sequence: usize,
    /// The fragment text, trimmed of surrounding whitespace.
    pub text: String,
}

/// Derive effective fragment-count bounds from a richness score.
///
/// Returns `(max(1, richness - 2), min(10, richness + 2))`. Callers that do
/// not specify explicit bounds use these to let richer documents fan out
/// into more fragments.
pub fn fragment_bounds(richness: u8) -> (usize, usize) {
    let min = richness.saturating_sub(2).max(1) as usize;
    let max = (richness + 2).min(10) as usize;
    (min, max)
}

/// Scores text richness and splits text into ordered fragments.
///
/// Holds the compiled structure patterns so repeated scoring and splitting
/// does not recompile them. Construct once and reuse.
pub struct Segmenter {
    bullet: Regex,
    header: Regex,
    concept: Regex,
    numbered: Regex,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter {
    /// Create a segmenter with the standard structure patterns.
    pub fn new() -> Self {
        Segmenter {
            // Lines starting with -, *, • or digits, optionally dotted
            bullet: Regex::new(r"(?m)^\s*[-*•\d]+\.?\s").unwrap(),
            // Markdown headings, or short standalone title-case lines
            header: Regex::new(r"(?m)^#{1,6}\s|^[A-Z][^.!?\n]{5,60}$").unwrap(),
            // Capitalized phrases, used as a proxy for distinct concepts
            concept: Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b").unwrap(),
            // Numbered-list line starts
            numbered: Regex::new(r"^\d+\.\s").unwrap(),
        }
    }

    /// Estimate how much distinct content `content` holds, on a 1–10 scale.
    ///
    /// The score is a weighted sum of five capped signals:
    ///
    /// - character count: 1 point per 500 characters, max 3
    /// - non-empty lines: 1 point per 5, max 2
    /// - bullet / numbered-list lines: 1 point per 5, max 2
    /// - header-like lines: 1 point per 3, max 2
    /// - distinct capitalized phrases: 1 point per 20, max 1
    ///
    /// Empty or whitespace-only content scores 1. The result is clamped to
    /// `[1, 10]` and, for fixed structure, is monotonically non-decreasing
    /// in character count.
    pub fn richness(&self, content: &str) -> u8 {
        if content.trim().is_empty() {
            return 1;
        }

        let char_count = content.chars().count();
        let paragraph_count = content.lines().filter(|l| !l.trim().is_empty()).count();
        let bullet_count = self.bullet.find_iter(content).count();
        let header_count = self.header.find_iter(content).count();
        let concept_count = self
            .concept
            .find_iter(content)
            .map(|m| m.as_str())
            .collect::<HashSet<_>>()
            .len();

        let score = (char_count / 500).min(3)
            + (paragraph_count / 5).min(2)
            + (bullet_count / 5).min(2)
            + (header_count / 3).min(2)
            + (concept_count / 20).min(1);

        score.clamp(1, 10) as u8
    }

    /// Split `content` into between zero and `max_fragments` ordered
    /// fragments.
    ///
    /// Three strategies are attempted in order; the first that succeeds
    /// wins:
    ///
    /// 1. **Structural**: scan line by line for section starts (headings,
    ///    numbered items, non-indented lines), discard sections under 50
    ///    characters, succeed when at least `min_fragments` survive.
    /// 2. **Paragraph grouping**: split on blank lines, keep paragraphs over
    ///    30 characters, group them into `clamp(richness, min, max)` bins of
    ///    consecutive paragraphs.
    /// 3. **Single fragment**: the whole trimmed content, provided it
    ///    exceeds 20 characters. Anything shorter yields an empty vec.
    pub fn segment(
        &self,
        content: &str,
        min_fragments: usize,
        max_fragments: usize,
    ) -> Vec<String> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        if let Some(sections) = self.split_structural(content, min_fragments, max_fragments) {
            return sections;
        }

        if let Some(groups) = self.group_paragraphs(content, min_fragments, max_fragments) {
            return groups;
        }

        let trimmed = content.trim();
        if trimmed.chars().count() > MIN_FRAGMENT_CHARS {
            vec![trimmed.to_string()]
        } else {
            Vec::new()
        }
    }

    /// Structural tier: cut at headings, numbered items and non-indented
    /// lines, tracking fence state so fenced code is never cut internally.
    fn split_structural(
        &self,
        content: &str,
        min_fragments: usize,
        max_fragments: usize,
    ) -> Option<Vec<String>> {
        let mut sections: Vec<String> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut in_fence = false;

        let close = |current: &mut Vec<&str>, sections: &mut Vec<String>| {
            let joined = current.join("\n");
            let trimmed = joined.trim();
            if !trimmed.is_empty() {
                sections.push(trimmed.to_string());
            }
            current.clear();
        };

        for line in content.lines() {
            // Fence state flips before the section check, so a closing fence
            // line is treated as outside the fence.
            if line.contains("```") {
                in_fence = !in_fence;
            }

            let starts_section = !in_fence
                && (line.starts_with("# ")
                    || line.starts_with("## ")
                    || line.starts_with("### ")
                    || self.numbered.is_match(line)
                    || (!line.trim().is_empty()
                        && !line.starts_with(' ')
                        && !line.starts_with('\t')));

            if starts_section && !current.iter().all(|l| l.trim().is_empty()) {
                close(&mut current, &mut sections);
            }
            current.push(line);
        }
        close(&mut current, &mut sections);

        let mut survivors: Vec<String> = sections
            .into_iter()
            .filter(|s| s.chars().count() >= MIN_SECTION_CHARS)
            .collect();

        if survivors.len() >= min_fragments.max(1) {
            survivors.truncate(max_fragments);
            Some(survivors)
        } else {
            None
        }
    }

    /// Paragraph tier: concatenate consecutive paragraphs into a
    /// richness-sized number of bins.
    fn group_paragraphs(
        &self,
        content: &str,
        min_fragments: usize,
        max_fragments: usize,
    ) -> Option<Vec<String>> {
        let paragraphs: Vec<&str> = content
            .split("\n\n")
            .map(str::trim)
            .filter(|p| p.chars().count() > MIN_PARAGRAPH_CHARS)
            .collect();

        if paragraphs.len() < min_fragments.max(1) {
            return None;
        }

        let target = (self.richness(content) as usize).clamp(min_fragments.max(1), max_fragments);
        let per_bin = (paragraphs.len() / target).max(1);

        let mut bins: Vec<String> = Vec::new();
        let mut current = String::new();

        for (i, paragraph) in paragraphs.iter().enumerate() {
            current.push_str(paragraph);
            current.push_str("\n\n");
            if (i + 1) % per_bin == 0 || i == paragraphs.len() - 1 {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    bins.push(trimmed.to_string());
                }
                current.clear();
            }
        }

        bins.truncate(max_fragments);
        Some(bins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_richness_empty_and_whitespace() {
        let segmenter = Segmenter::new();
        assert_eq!(segmenter.richness(""), 1);
        assert_eq!(segmenter.richness("   \n\t\n  "), 1);
    }

    #[test]
    fn test_richness_short_plain_text() {
        let segmenter = Segmenter::new();
        assert_eq!(segmenter.richness("short"), 1);
    }

    #[test]
    fn test_richness_structured_document_scores_high() {
        let segmenter = Segmenter::new();

        // ~3000 characters, 4 headers, 10 bullets
        let mut content = String::new();
        for section in 0..4 {
            content.push_str(&format!("# Section Heading {section}\n"));
            content.push_str(&"An ordinary prose line with some words in it to pad things out. "
                .repeat(12));
            content.push('\n');
        }
        for bullet in 0..10 {
            content.push_str(&format!("- bullet item number {bullet}\n"));
        }
        assert!(content.chars().count() >= 3000);

        let score = segmenter.richness(&content);
        assert!(score >= 6, "expected >= 6, got {score}");
    }

    #[test]
    fn test_richness_monotonic_in_length() {
        let segmenter = Segmenter::new();
        let mut previous = 0;
        for repeats in [1, 5, 20, 80, 200] {
            let content = "plain filler words without structure ".repeat(repeats);
            let score = segmenter.richness(&content);
            assert!(score >= previous, "richness dropped at {repeats} repeats");
            previous = score;
        }
    }

    #[test]
    fn test_richness_bounds() {
        let segmenter = Segmenter::new();
        let huge = "# H\n- a bullet line here\nSome Capitalized Phrase Content\n".repeat(400);
        let score = segmenter.richness(&huge);
        assert!((1..=10).contains(&score));
    }

    #[test]
    fn test_fragment_bounds() {
        assert_eq!(fragment_bounds(1), (1, 3));
        assert_eq!(fragment_bounds(3), (1, 5));
        assert_eq!(fragment_bounds(5), (3, 7));
        assert_eq!(fragment_bounds(10), (8, 10));
    }

    #[test]
    fn test_segment_structural_split_by_headings() {
        let segmenter = Segmenter::new();
        let content = "\
# Alpha
    an indented continuation line long enough to clear the section filter
# Beta
    another indented continuation line that also clears the section filter";

        let fragments = segmenter.segment(content, 1, 10);
        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].starts_with("# Alpha"));
        assert!(fragments[1].starts_with("# Beta"));
    }

    #[test]
    fn test_segment_respects_max_fragments() {
        let segmenter = Segmenter::new();
        let mut content = String::new();
        for i in 0..8 {
            content.push_str(&format!(
                "# Part {i}\n    a sufficiently long indented body line for section number {i}\n"
            ));
        }
        let fragments = segmenter.segment(&content, 1, 3);
        assert_eq!(fragments.len(), 3);
    }

    #[test]
    fn test_segment_never_empty_for_meaningful_input() {
        let segmenter = Segmenter::new();
        let fragments = segmenter.segment("a single flat note with no structure at all", 1, 10);
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn test_segment_rejects_trivial_input() {
        let segmenter = Segmenter::new();
        assert!(segmenter.segment("tiny", 1, 10).is_empty());
        assert!(segmenter.segment("", 1, 10).is_empty());
        assert!(segmenter.segment("   \n  ", 1, 10).is_empty());
    }

    #[test]
    fn test_segment_fenced_code_is_not_split() {
        let segmenter = Segmenter::new();
        let content = "\
# Real Section
    an indented line padding this first section past the length filter
```
# fake heading inside the fence
let looks_like_code = true;
```
# Second Real Section
    another indented line padding the closing section past the filter";

        let fragments = segmenter.segment(content, 1, 10);

        // The fake heading must stay attached to the fragment that opened
        // the fence; it never starts a fragment of its own.
        assert!(fragments.iter().all(|f| !f.starts_with("# fake heading")));
        let fenced = fragments
            .iter()
            .find(|f| f.contains("# fake heading inside the fence"))
            .expect("fenced content should survive somewhere");
        assert!(fenced.contains("let looks_like_code = true;"));
    }

    #[test]
    fn test_segment_paragraph_grouping() {
        let segmenter = Segmenter::new();
        // Indented paragraphs so the structural tier cannot claim them.
        let content = (0..6)
            .map(|i| {
                format!("    paragraph number {i} with enough words to pass the length filter")
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let fragments = segmenter.segment(&content, 2, 4);
        assert!(fragments.len() >= 2);
        assert!(fragments.len() <= 4);

        // Order preserved: paragraph 0 in the first bin, the last paragraph
        // in the final bin.
        assert!(fragments[0].contains("paragraph number 0"));
        assert!(fragments.last().unwrap().contains("paragraph number 5"));
    }
}
