//! Output file naming

use crate::constants::UNTITLED_DOCUMENT;
use chrono::NaiveDate;

/// Replace every character outside `[A-Za-z0-9-_]` with `-`.
///
/// Replacement is per UTF-16 code unit, so characters outside the Basic
/// Multilingual Plane (most emoji) become two dashes.
pub fn sanitize_document_name(name: &str) -> String {
    if name.is_empty() {
        return UNTITLED_DOCUMENT.to_string();
    }
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        } else {
            out.extend(std::iter::repeat_n('-', c.len_utf16()));
        }
    }
    out
}

/// `{sanitized}-NoteCraft-{YYYY-MM-DD}.pdf`
pub fn export_filename(document_name: &str, date: NaiveDate) -> String {
    format!(
        "{}-NoteCraft-{}.pdf",
        sanitize_document_name(document_name),
        date.format("%Y-%m-%d")
    )
}

/// Filename stamped with today's UTC date
pub fn export_filename_today(document_name: &str) -> String {
    export_filename(document_name, chrono::Utc::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsafe_characters_become_dashes() {
        assert_eq!(sanitize_document_name("My Notes: Week 1/2"), "My-Notes--Week-1-2");
        assert_eq!(sanitize_document_name("ok_name-2"), "ok_name-2");
        assert_eq!(sanitize_document_name("café"), "caf-");
    }

    #[test]
    fn astral_characters_become_two_dashes() {
        assert_eq!(sanitize_document_name("Ideas 😀"), "Ideas---");
        assert_eq!(sanitize_document_name("𝔸b"), "--b");
    }

    #[test]
    fn empty_name_falls_back() {
        assert_eq!(sanitize_document_name(""), "Untitled-Document");
    }

    #[test]
    fn filename_carries_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            export_filename("Lecture 4", date),
            "Lecture-4-NoteCraft-2024-03-07.pdf"
        );
    }
}
