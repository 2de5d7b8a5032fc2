//! Human-readable description and annotation text shared by every service.

use std::borrow::Cow;
use std::fmt::Display;

/// Prefix marking descriptions produced by this tool.
pub const MARKUP: &str = "(bw)";

const URL_SEPARATOR: &str = " .. ";

/// Formatting settings applied to descriptions and annotations.
///
/// Built from `[general]` plus the per-target settings, see
/// [`crate::config::GeneralConfig::formatter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Formatter {
    /// Maximum title length in characters. `None` keeps the full title.
    pub description_length: Option<usize>,
    /// Maximum annotation message length in characters. `None` keeps the full message.
    pub annotation_length: Option<usize>,
    /// Append the record URL to the description.
    pub inline_links: bool,
    /// Emit the record URL as the first annotation.
    pub annotation_links: bool,
    /// Emit comment annotations at all.
    pub annotation_comments: bool,
    /// Keep line breaks inside annotation messages.
    pub annotation_newlines: bool,
}

impl Default for Formatter {
    fn default() -> Self {
        Self {
            description_length: Some(35),
            annotation_length: Some(45),
            inline_links: true,
            annotation_links: false,
            annotation_comments: true,
            annotation_newlines: false,
        }
    }
}

impl Formatter {
    /// Builds `(bw){class}#{number} - {title} .. {url}`.
    pub fn description(&self, title: &str, url: &str, number: impl Display, class: &str) -> String {
        let title = match self.description_length {
            Some(len) => truncate_chars(title, len),
            None => title,
        };
        let url = if self.inline_links { url } else { "" };
        let separator = if url.is_empty() { "" } else { URL_SEPARATOR };
        format!(
            "{}{}#{} - {}{}{}",
            MARKUP,
            class_markup(class),
            number,
            title,
            separator,
            url
        )
    }

    /// Turns `(author, message)` pairs into `@author - message` annotations.
    ///
    /// Entries with an empty author or message are dropped; order is kept.
    pub fn annotations<I, A, M>(&self, entries: I, url: Option<&str>) -> Vec<String>
    where
        I: IntoIterator<Item = (A, M)>,
        A: AsRef<str>,
        M: AsRef<str>,
    {
        let mut annotations = Vec::new();
        if let Some(url) = url.filter(|u| self.annotation_links && !u.is_empty()) {
            annotations.push(url.to_string());
        }
        if !self.annotation_comments {
            return annotations;
        }

        for (author, message) in entries {
            let author = author.as_ref();
            let message = message.as_ref().trim();
            if author.is_empty() || message.is_empty() {
                continue;
            }
            let message: Cow<'_, str> = if self.annotation_newlines {
                Cow::Borrowed(message)
            } else {
                Cow::Owned(message.replace(['\n', '\r'], ""))
            };
            let message = match self.annotation_length {
                Some(len) if message.chars().count() > len => {
                    format!("{}...", truncate_chars(&message, len))
                }
                _ => message.into_owned(),
            };
            annotations.push(format!("@{} - {}", author, message));
        }
        annotations
    }
}

/// Short tag for a record class: `issue` → `Is`, `pull_request` → `PR`, others title-cased.
pub fn class_markup(class: &str) -> Cow<'_, str> {
    match class {
        "issue" => Cow::Borrowed("Is"),
        "pull_request" => Cow::Borrowed("PR"),
        "merge_request" => Cow::Borrowed("MR"),
        "todo" | "task" => Cow::Borrowed(""),
        "subtask" => Cow::Borrowed("Subtask #"),
        other => Cow::Owned(title_case(other)),
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_with_inline_link() {
        let f = Formatter::default();
        assert_eq!(
            f.description("Fix", "https://redmine/issues/42", 42, "issue"),
            "(bw)Is#42 - Fix .. https://redmine/issues/42"
        );
    }

    #[test]
    fn test_description_without_inline_link() {
        let f = Formatter {
            inline_links: false,
            ..Formatter::default()
        };
        assert_eq!(
            f.description("Review me", "https://review/#/c/7/", 7, "pull_request"),
            "(bw)PR#7 - Review me"
        );
    }

    #[test]
    fn test_description_truncates_title() {
        let f = Formatter {
            description_length: Some(5),
            inline_links: false,
            ..Formatter::default()
        };
        assert_eq!(f.description("Tractor beam", "", 561, "story"), "(bw)Story#561 - Tract");
    }

    #[test]
    fn test_class_markup() {
        assert_eq!(class_markup("issue"), "Is");
        assert_eq!(class_markup("pull_request"), "PR");
        assert_eq!(class_markup("merge_request"), "MR");
        assert_eq!(class_markup("task"), "");
        assert_eq!(class_markup("subtask"), "Subtask #");
        assert_eq!(class_markup("story"), "Story");
        assert_eq!(class_markup("feature"), "Feature");
    }

    #[test]
    fn test_annotations_basic() {
        let f = Formatter::default();
        let notes = f.annotations(vec![("alice", "  looks good  "), ("", "dropped"), ("bob", " ")], None);
        assert_eq!(notes, vec!["@alice - looks good".to_string()]);
    }

    #[test]
    fn test_annotations_truncate_and_strip_newlines() {
        let f = Formatter {
            annotation_length: Some(10),
            ..Formatter::default()
        };
        let notes = f.annotations(vec![("carol", "line one\nline two is long")], None);
        assert_eq!(notes, vec!["@carol - line oneli...".to_string()]);
    }

    #[test]
    fn test_annotations_keep_newlines_when_enabled() {
        let f = Formatter {
            annotation_newlines: true,
            annotation_length: None,
            ..Formatter::default()
        };
        let notes = f.annotations(vec![("dave", "a\nb")], None);
        assert_eq!(notes, vec!["@dave - a\nb".to_string()]);
    }

    #[test]
    fn test_annotations_link_first_and_comments_off() {
        let f = Formatter {
            annotation_links: true,
            annotation_comments: false,
            ..Formatter::default()
        };
        let notes = f.annotations(vec![("erin", "hidden")], Some("https://x/1"));
        assert_eq!(notes, vec!["https://x/1".to_string()]);
    }
}
