use crate::BatchError;
use regex::Regex;

const DOI_SCAN_CHARS: usize = 5_000;
const TITLE_GUESS_CHARS: usize = 100;

/// Tidies raw extracted page text: collapses runs of blank lines, drops
/// bare page-number lines and re-joins words hyphenated across a break.
pub fn clean_text(text: &str) -> Result<String, BatchError> {
    let blank_runs = Regex::new(r"\n{3,}")?;
    let page_number_lines = Regex::new(r"\n\d+\s*\n")?;
    let hyphen_breaks = Regex::new(r"(\w)-\n(\w)")?;

    let text = blank_runs.replace_all(text, "\n\n");
    let text = page_number_lines.replace_all(&text, "\n");
    let text = hyphen_breaks.replace_all(&text, "${1}${2}");
    Ok(text.trim().to_string())
}

pub fn has_content(text: &str) -> bool {
    text.chars().any(|ch| !ch.is_whitespace())
}

pub fn find_doi(text: &str) -> Result<Option<String>, BatchError> {
    let doi = Regex::new(r"10\.\d{4,}/\S+")?;
    let head: String = text.chars().take(DOI_SCAN_CHARS).collect();

    Ok(doi
        .find(&head)
        .map(|found| found.as_str().trim_end_matches(&['.', ',', ';'][..]).to_string())
        .filter(|doi| !doi.is_empty()))
}

/// Readable title from a file stem such as `2021 - Cost_overruns`.
///
/// Drops a leading year prefix and turns `-`/`_` into spaces.
pub fn title_guess(stem: &str) -> Result<String, BatchError> {
    let year_prefix = Regex::new(r"^\d{4}\s*[-_]\s*")?;
    let separators = Regex::new(r"[-_]")?;

    let title = year_prefix.replace(stem, "");
    let title = separators.replace_all(&title, " ");
    Ok(title.chars().take(TITLE_GUESS_CHARS).collect())
}
