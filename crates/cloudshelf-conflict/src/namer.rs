//! Naming for preserved document copies
//!
//! Generates the names under which a document's current content survives
//! an overwrite: `report.epub` becomes `report_1.epub`, an existing
//! `report_3.epub` becomes `report_4.epub`, and probing continues until
//! an unused name is found. The renamed file re-appears to the watchers
//! as a fresh document and flows back up as a new upload.

/// Generates unique preserved-copy file names
pub struct PreservedCopyNamer;

impl PreservedCopyNamer {
    /// Produces the next candidate name for `original_name`.
    ///
    /// Given "report.epub", produces "report_1.epub". If the input
    /// already carries a counter ("report_3.epub"), the counter is
    /// incremented. Names without an extension get the counter appended
    /// ("Makefile" becomes "Makefile_1").
    pub fn next(original_name: &str) -> String {
        let (stem, extension) = split_name(original_name);
        let (base, counter) = split_counter(stem);
        if extension.is_empty() {
            format!("{base}_{}", counter + 1)
        } else {
            format!("{base}_{}.{extension}", counter + 1)
        }
    }

    /// Probes candidates until `exists` reports a free name.
    pub fn next_unused<F>(original_name: &str, mut exists: F) -> String
    where
        F: FnMut(&str) -> bool,
    {
        let mut candidate = Self::next(original_name);
        while exists(&candidate) {
            candidate = Self::next(&candidate);
        }
        candidate
    }
}

/// Splits "stem.ext" into ("stem", "ext"). A leading dot is part of the
/// stem, so hidden files keep their name intact.
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(position) => (&name[..position], &name[position + 1..]),
    }
}

/// Splits a trailing `_N` counter off a stem: "report_3" becomes
/// ("report", 3); a stem without a counter keeps itself with 0.
fn split_counter(stem: &str) -> (&str, u32) {
    if let Some(position) = stem.rfind('_') {
        let digits = &stem[position + 1..];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(counter) = digits.parse::<u32>() {
                return (&stem[..position], counter);
            }
        }
    }
    (stem, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_with_extension() {
        assert_eq!(PreservedCopyNamer::next("report.epub"), "report_1.epub");
    }

    #[test]
    fn test_next_increments_existing_counter() {
        assert_eq!(PreservedCopyNamer::next("report_1.epub"), "report_2.epub");
        assert_eq!(PreservedCopyNamer::next("report_9.epub"), "report_10.epub");
    }

    #[test]
    fn test_next_without_extension() {
        assert_eq!(PreservedCopyNamer::next("Makefile"), "Makefile_1");
        assert_eq!(PreservedCopyNamer::next("Makefile_2"), "Makefile_3");
    }

    #[test]
    fn test_next_with_multiple_dots() {
        assert_eq!(
            PreservedCopyNamer::next("archive.tar.gz"),
            "archive.tar_1.gz"
        );
    }

    #[test]
    fn test_hidden_file_keeps_leading_dot() {
        assert_eq!(PreservedCopyNamer::next(".notes"), ".notes_1");
    }

    #[test]
    fn test_underscore_without_digits_is_not_a_counter() {
        assert_eq!(PreservedCopyNamer::next("my_book.epub"), "my_book_1.epub");
        assert_eq!(PreservedCopyNamer::next("a_b_c.epub"), "a_b_c_1.epub");
    }

    #[test]
    fn test_next_unused_probes_past_collisions() {
        let taken = ["report_1.epub", "report_2.epub"];
        let name = PreservedCopyNamer::next_unused("report.epub", |candidate| {
            taken.contains(&candidate)
        });
        assert_eq!(name, "report_3.epub");
    }

    #[test]
    fn test_next_unused_no_collision() {
        let name = PreservedCopyNamer::next_unused("report.epub", |_| false);
        assert_eq!(name, "report_1.epub");
    }
}
