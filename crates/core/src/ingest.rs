use crate::text::normalize_whitespace;
use crate::{BookEntry, IngestError, IngestionOptions};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub const DEFAULT_SHORT_SUMMARIES_PATH: &str = "data/book_summaries.md";

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedBlock {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngestionReport {
    pub entries: Vec<BookEntry>,
    pub skipped_blocks: Vec<SkippedBlock>,
}

/// Parses `## Title:` blocks. Each block holds summary lines and an optional
/// `Themes:` line; malformed or repeated blocks are reported, not fatal.
pub fn parse_book_summaries(
    text: &str,
    options: &IngestionOptions,
) -> Result<IngestionReport, IngestError> {
    let header_re = Regex::new(options.title_header_regex)?;
    let themes_re = Regex::new(options.themes_regex)?;
    let theme_separator_re = Regex::new(r"[,|]")?;

    let mut report = IngestionReport::default();
    let mut seen = HashSet::new();

    // Anything before the first header is preamble.
    let blocks = header_re
        .split(text)
        .skip(1)
        .map(str::trim)
        .filter(|block| !block.is_empty());

    for (index, block) in blocks.enumerate() {
        let (title_line, rest) = block.split_once('\n').unwrap_or((block, ""));
        let title = normalize_whitespace(title_line);

        let (summary_text, themes) = match themes_re.captures(rest) {
            Some(captures) => {
                let themes = captures
                    .get(1)
                    .map(|line| {
                        theme_separator_re
                            .split(line.as_str())
                            .map(str::trim)
                            .filter(|theme| !theme.is_empty())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                let start = captures.get(0).map_or(rest.len(), |whole| whole.start());
                (&rest[..start], themes)
            }
            None => (rest, Vec::new()),
        };

        let short_summary = summary_text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let reason = if title.is_empty() {
            Some("missing title".to_string())
        } else if short_summary.is_empty() {
            Some(format!("missing summary for {title:?}"))
        } else if !seen.insert(title.clone()) {
            Some(format!("duplicate title {title:?}"))
        } else {
            None
        };

        match reason {
            Some(reason) => report.skipped_blocks.push(SkippedBlock { index, reason }),
            None => report.entries.push(BookEntry {
                title,
                short_summary,
                themes,
            }),
        }
    }

    Ok(report)
}

pub fn load_book_summaries(
    path: &Path,
    options: &IngestionOptions,
) -> Result<IngestionReport, IngestError> {
    let text = fs::read_to_string(path)?;
    let report = parse_book_summaries(&text, options)?;

    if report.entries.len() < options.min_books {
        return Err(IngestError::TooFewBooks {
            expected: options.min_books,
            found: report.entries.len(),
        });
    }

    Ok(report)
}

/// Text that gets embedded for one book.
pub fn build_document_text(entry: &BookEntry) -> String {
    let mut document = format!("Title: {}\nSummary: {}", entry.title, entry.short_summary);
    if !entry.themes.is_empty() {
        document.push_str("\nThemes: ");
        document.push_str(&entry.themes.join(", "));
    }
    document
}

pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for character in title.trim().to_lowercase().chars() {
        if character.is_ascii_alphanumeric() {
            slug.push(character);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}

/// Stable numeric point id derived from the title slug.
pub fn point_id(title: &str) -> u64 {
    let digest = Sha256::digest(slugify(title).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
# Book summaries

## Title: 1984
Winston Smith works at the Ministry of Truth.

He falls in love and rebels.
Themes: surveillance, totalitarianism | freedom

## Title: The Hobbit
Bilbo Baggins leaves the Shire.
themes: adventure, courage

## Title: Empty Block
Themes: nothing

## Title: 1984
A second copy that should be ignored.
";

    #[test]
    fn parses_blocks_and_reports_malformed_ones() -> Result<(), IngestError> {
        let report = parse_book_summaries(SAMPLE, &IngestionOptions::default())?;

        assert_eq!(report.entries.len(), 2);
        let first = &report.entries[0];
        assert_eq!(first.title, "1984");
        assert_eq!(
            first.short_summary,
            "Winston Smith works at the Ministry of Truth.\nHe falls in love and rebels."
        );
        assert_eq!(first.themes, vec!["surveillance", "totalitarianism", "freedom"]);
        assert_eq!(report.entries[1].themes, vec!["adventure", "courage"]);

        let reasons: Vec<_> = report
            .skipped_blocks
            .iter()
            .map(|skipped| skipped.reason.as_str())
            .collect();
        assert_eq!(
            reasons,
            vec![
                "missing summary for \"Empty Block\"",
                "duplicate title \"1984\""
            ]
        );
        Ok(())
    }

    #[test]
    fn loading_enforces_the_minimum_book_count() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("books.md");
        fs::write(&path, SAMPLE)?;

        let result = load_book_summaries(&path, &IngestionOptions::default());
        assert!(matches!(
            result,
            Err(IngestError::TooFewBooks {
                expected: 10,
                found: 2
            })
        ));

        let relaxed = IngestionOptions {
            min_books: 2,
            ..IngestionOptions::default()
        };
        assert_eq!(load_book_summaries(&path, &relaxed)?.entries.len(), 2);
        Ok(())
    }

    #[test]
    fn document_text_includes_themes_when_present() {
        let entry = BookEntry {
            title: "Dune".to_string(),
            short_summary: "Spice and sand.".to_string(),
            themes: vec!["power".to_string(), "ecology".to_string()],
        };
        assert_eq!(
            build_document_text(&entry),
            "Title: Dune\nSummary: Spice and sand.\nThemes: power, ecology"
        );
    }

    #[test]
    fn slugs_and_point_ids_are_stable() {
        assert_eq!(
            slugify("Harry Potter and the Sorcerer's Stone"),
            "harry-potter-and-the-sorcerer-s-stone"
        );
        assert_eq!(slugify("  ?! "), "untitled");
        assert_eq!(point_id("1984"), point_id("1984"));
        assert_ne!(point_id("1984"), point_id("Dune"));
    }
}
