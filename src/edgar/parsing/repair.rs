use regex::Regex;
use strum::{Display, EnumIter, IntoEnumIterator};

use super::error::ExtractError;
use crate::core::Diagnostics;

pub const ACCEPTANCE_MARKER: &str = "<ACCEPTANCE-DATETIME>";
pub const ACCEPTANCE_LABEL: &str = "ACCEPTANCE-DATETIME: ";

/// Submission header tags that EDGAR emits without a closing tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum UnclosedTag {
    Type,
    Sequence,
    Filename,
    Description,
}

impl UnclosedTag {
    pub fn closer(&self) -> String {
        format!("</{}>", self)
    }

    fn pattern(&self) -> Result<Regex, regex::Error> {
        Regex::new(&format!(r"<({})>([^<]*)(<[^>]*>)", self))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagOccurrence {
    pub start: usize,
    pub end: usize,
    pub tag: UnclosedTag,
    pub closer: String,
    /// The bracket sequence found right after the tag value.
    pub trailing: String,
}

impl TagOccurrence {
    pub fn needs_closer(&self) -> bool {
        self.closer != self.trailing
    }

    pub fn insertion_point(&self) -> usize {
        self.end - self.trailing.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepairEdit {
    pub position: usize,
    pub text: String,
}

/// Strips the XML prolog, replaces bare ampersands and turns the acceptance
/// marker into a `key: value` line.
pub fn normalize(text: &str) -> Result<String, regex::Error> {
    let prolog = Regex::new(r"<\?xml.*?\?>")?;
    let text = prolog.replace_all(text, "");
    Ok(text
        .replace('&', "and")
        .replace(ACCEPTANCE_MARKER, ACCEPTANCE_LABEL))
}

/// All unclosed-tag matches in document order.
pub fn find_occurrences(text: &str) -> Result<Vec<TagOccurrence>, regex::Error> {
    let mut occurrences = Vec::new();
    for tag in UnclosedTag::iter() {
        let re = tag.pattern()?;
        for caps in re.captures_iter(text) {
            let (Some(whole), Some(trailing)) = (caps.get(0), caps.get(3)) else {
                continue;
            };
            occurrences.push(TagOccurrence {
                start: whole.start(),
                end: whole.end(),
                tag,
                closer: tag.closer(),
                trailing: trailing.as_str().to_string(),
            });
        }
    }
    occurrences.sort_by_key(|o| o.start);
    Ok(occurrences)
}

/// Turns sorted occurrences into non-overlapping, ascending insertions.
pub fn plan_edits(occurrences: &[TagOccurrence], diagnostics: &Diagnostics) -> Vec<RepairEdit> {
    let mut edits: Vec<RepairEdit> = Vec::new();
    let mut cursor = 0;
    for occurrence in occurrences.iter().filter(|o| o.needs_closer()) {
        let position = occurrence.insertion_point();
        if position < cursor {
            diagnostics.warn(&format!(
                "unresolvable {} closer at offset {} (already past {}), skipping",
                occurrence.tag, position, cursor
            ));
            continue;
        }
        edits.push(RepairEdit {
            position,
            text: format!("{}\n", occurrence.closer),
        });
        cursor = position;
    }
    edits
}

/// Splices `edits` into `text` in one forward pass. Edit positions refer to
/// offsets in `text`, not in the output.
pub fn apply_edits(text: &str, edits: &[RepairEdit]) -> String {
    let extra: usize = edits.iter().map(|e| e.text.len()).sum();
    let mut out = String::with_capacity(text.len() + extra);
    let mut cursor = 0;
    for edit in edits {
        out.push_str(&text[cursor..edit.position]);
        out.push_str(&edit.text);
        cursor = edit.position;
    }
    out.push_str(&text[cursor..]);
    out
}

pub fn repair(text: &str, diagnostics: &Diagnostics) -> Result<String, ExtractError> {
    let normalized = normalize(text)?;
    let occurrences = find_occurrences(&normalized)?;
    let edits = plan_edits(&occurrences, diagnostics);
    diagnostics.debug(&format!(
        "{} unclosed tag occurrences, {} closers inserted",
        occurrences.len(),
        edits.len()
    ));
    Ok(apply_edits(&normalized, &edits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgar::parsing::tree::parse_markup;

    fn quiet() -> Diagnostics {
        Diagnostics::default()
    }

    #[test]
    fn test_no_occurrences_is_identity() {
        let text = "<informationTable><infoTable><value>1</value></infoTable></informationTable>";
        assert_eq!(repair(text, &quiet()).unwrap(), text);
    }

    #[test]
    fn test_inserts_closers_before_next_tag() {
        let text = "<DOCUMENT><TYPE>10-K<SEQUENCE>1<FILENAME>x.txt<TEXT>body</TEXT></DOCUMENT>";
        let repaired = repair(text, &quiet()).unwrap();
        assert_eq!(
            repaired,
            "<DOCUMENT><TYPE>10-K</TYPE>\n<SEQUENCE>1</SEQUENCE>\n<FILENAME>x.txt</FILENAME>\n<TEXT>body</TEXT></DOCUMENT>"
        );
        assert!(parse_markup(&repaired).is_ok());
    }

    #[test]
    fn test_repair_is_idempotent() {
        let text = "<DOCUMENT>\n<TYPE>13F-HR\n<SEQUENCE>1\n<FILENAME>primary_doc.xml\n<DESCRIPTION>FORM 13F\n<TEXT>\n</TEXT>\n</DOCUMENT>";
        let once = repair(text, &quiet()).unwrap();
        let twice = repair(&once, &quiet()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_existing_closer_is_left_alone() {
        let text = "<DOC><TYPE>13F-HR</TYPE><SEQUENCE>2<TEXT>x</TEXT></DOC>";
        let repaired = repair(text, &quiet()).unwrap();
        assert_eq!(
            repaired,
            "<DOC><TYPE>13F-HR</TYPE><SEQUENCE>2</SEQUENCE>\n<TEXT>x</TEXT></DOC>"
        );
    }

    #[test]
    fn test_occurrences_sorted_across_tag_names() {
        let text = "<FILENAME>a.xml<TYPE>X<SEQUENCE>1<TYPE>Y<TEXT>";
        let occurrences = find_occurrences(text).unwrap();
        let tags: Vec<UnclosedTag> = occurrences.iter().map(|o| o.tag).collect();
        assert_eq!(
            tags,
            vec![
                UnclosedTag::Filename,
                UnclosedTag::Type,
                UnclosedTag::Sequence,
                UnclosedTag::Type
            ]
        );
        assert!(occurrences.windows(2).all(|w| w[0].start < w[1].start));
    }

    #[test]
    fn test_normalize() {
        let text = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<ACCEPTANCE-DATETIME>20211110163012\n<name>AT&T</name>";
        let normalized = normalize(text).unwrap();
        assert_eq!(
            normalized,
            "\nACCEPTANCE-DATETIME: 20211110163012\n<name>ATandT</name>"
        );
    }

    #[test]
    fn test_overlapping_edit_is_skipped() {
        let sink = std::sync::Arc::new(crate::core::MemorySink::new("test"));
        let diagnostics = Diagnostics::new(vec![sink.clone()]);
        let occurrences = vec![
            TagOccurrence {
                start: 0,
                end: 20,
                tag: UnclosedTag::Type,
                closer: "</TYPE>".to_string(),
                trailing: "<X>".to_string(),
            },
            TagOccurrence {
                start: 5,
                end: 12,
                tag: UnclosedTag::Sequence,
                closer: "</SEQUENCE>".to_string(),
                trailing: "<Y>".to_string(),
            },
        ];

        let edits = plan_edits(&occurrences, &diagnostics);
        assert_eq!(
            edits,
            vec![RepairEdit {
                position: 17,
                text: "</TYPE>\n".to_string()
            }]
        );
        assert_eq!(sink.count(log::Level::Warn), 1);
    }

    #[test]
    fn test_apply_edits_uses_original_offsets() {
        let edits = vec![
            RepairEdit {
                position: 1,
                text: "[".to_string(),
            },
            RepairEdit {
                position: 3,
                text: "]".to_string(),
            },
        ];
        assert_eq!(apply_edits("abcd", &edits), "a[bc]d");
        assert_eq!(apply_edits("abcd", &[]), "abcd");
    }
}
