//! Tag derivation for imported notes.

use crate::config::ImportConfig;
use quiz_core::{QuestionSegment, QuestionType};
use regex::Regex;
use std::collections::HashSet;

/// Compiled tag settings for one import call.
pub struct TagRules<'c> {
    config: &'c ImportConfig,
    strip: Option<Regex>,
}

impl<'c> TagRules<'c> {
    pub fn new(config: &'c ImportConfig) -> Self {
        let strip = if config.chapter_prefix_strip.is_empty() {
            None
        } else {
            match Regex::new(&config.chapter_prefix_strip) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(
                        pattern = %config.chapter_prefix_strip,
                        error = %e,
                        "Invalid chapter prefix pattern, chapter levels kept as written"
                    );
                    None
                }
            }
        };

        Self { config, strip }
    }

    /// Split a multi-tag string on the configured separator.
    pub fn split(&self, raw: &str) -> Vec<String> {
        let separator = self.config.tag_separator.as_str();
        let pieces: Vec<&str> = if separator.is_empty() {
            vec![raw]
        } else if separator.trim().is_empty() {
            raw.split_whitespace().collect()
        } else {
            raw.split(separator).collect()
        };

        pieces
            .into_iter()
            .map(normalize_tag)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// The trailing `chapter_depth` levels of a deck hierarchy, ordering
    /// prefixes removed.
    pub fn chapter_tag(&self, deck: &str) -> Option<String> {
        let separator = self.config.hierarchy_separator.as_str();
        let levels: Vec<&str> = if separator.is_empty() {
            vec![deck.trim()]
        } else {
            deck.split(separator)
                .map(str::trim)
                .filter(|level| !level.is_empty())
                .collect()
        };

        let depth = self.config.chapter_depth.max(1);
        let start = levels.len().saturating_sub(depth);
        let cleaned: Vec<String> = levels[start..]
            .iter()
            .map(|level| self.strip_prefix(level))
            .filter(|level| !level.is_empty())
            .collect();

        if cleaned.is_empty() {
            return None;
        }
        Some(normalize_tag(&cleaned.join(separator)))
    }

    pub fn type_tag(&self, question_type: QuestionType) -> String {
        format!("{}{}", self.config.type_tag_prefix, question_type.as_str())
    }

    /// Base tags, then the segment's own tags, then chapter and type tags.
    /// Duplicates are dropped case-insensitively, first spelling wins.
    pub fn tags_for(&self, segment: &QuestionSegment, deck: &str) -> Vec<String> {
        let mut tags = Vec::new();

        for raw in &self.config.base_tags {
            tags.extend(self.split(raw));
        }
        let chapter = self.chapter_tag(deck);
        for raw in &segment.tags {
            for tag in self.split(raw) {
                match &chapter {
                    Some(chapter) if self.config.nest_tags_under_chapter => {
                        tags.push(self.nest_under(&tag, chapter));
                    }
                    _ => tags.push(tag),
                }
            }
        }
        if self.config.add_chapter_tag {
            tags.extend(chapter);
        }
        if self.config.add_type_tag {
            tags.push(self.type_tag(segment.question_type));
        }

        let mut seen = HashSet::new();
        tags.retain(|t| seen.insert(t.to_lowercase()));
        tags
    }

    /// Place `tag` below `chapter`, sharing any levels where the end of the
    /// chapter matches the start of the tag. Type tags are left as they are.
    fn nest_under(&self, tag: &str, chapter: &str) -> String {
        let separator = self.config.hierarchy_separator.as_str();
        let type_prefix = self.config.type_tag_prefix.as_str();
        if separator.is_empty() || (!type_prefix.is_empty() && tag.starts_with(type_prefix)) {
            return tag.to_string();
        }

        let chapter_levels: Vec<&str> = chapter.split(separator).collect();
        let tag_levels: Vec<&str> = tag
            .split(separator)
            .filter(|level| !level.is_empty())
            .collect();
        if tag_levels.is_empty() {
            return tag.to_string();
        }
        if chapter_levels.starts_with(&tag_levels) {
            return chapter.to_string();
        }

        let overlap = (1..=chapter_levels.len().min(tag_levels.len()))
            .rev()
            .find(|&n| chapter_levels[chapter_levels.len() - n..] == tag_levels[..n])
            .unwrap_or(0);
        chapter_levels[..chapter_levels.len() - overlap]
            .iter()
            .chain(&tag_levels)
            .copied()
            .collect::<Vec<_>>()
            .join(separator)
    }

    fn strip_prefix(&self, level: &str) -> String {
        match &self.strip {
            Some(re) => re.replace(level, "").trim().to_string(),
            None => level.to_string(),
        }
    }
}

/// Tags cannot hold whitespace; inner runs become `_`.
fn normalize_tag(tag: &str) -> String {
    tag.split_whitespace().collect::<Vec<_>>().join("_")
}
