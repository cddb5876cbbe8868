/*!
 * Puts translated chunks back into document order.
 */

use std::collections::BTreeMap;

use crate::errors::TranslationError;

use super::document::{TranslatedDocument, TranslationResult};

/// Rebuild translated lines from dispatch results.
///
/// Results are grouped by line and ordered by their position within the
/// line, never by arrival order. Every line must be covered and positions
/// must run 0..n without gaps or duplicates.
pub fn reassemble(
    line_count: usize,
    results: Vec<TranslationResult>,
    trailing_newline: bool,
) -> Result<TranslatedDocument, TranslationError> {
    let mut groups: Vec<BTreeMap<usize, String>> = vec![BTreeMap::new(); line_count];

    for result in results {
        let group = groups.get_mut(result.line_index).ok_or_else(|| {
            TranslationError::Reassembly(format!(
                "Result references line {} but the document has {} lines",
                result.line_index, line_count
            ))
        })?;
        if group.insert(result.position, result.text).is_some() {
            return Err(TranslationError::Reassembly(format!(
                "Duplicate result for line {} position {}",
                result.line_index, result.position
            )));
        }
    }

    let mut lines = Vec::with_capacity(line_count);
    for (line_index, group) in groups.into_iter().enumerate() {
        if group.is_empty() {
            return Err(TranslationError::Reassembly(format!("Line {} has no translation", line_index)));
        }
        if let Some((expected, _)) = group.keys().enumerate().find(|(expected, position)| expected != *position) {
            return Err(TranslationError::Reassembly(format!(
                "Line {} is missing chunk {}",
                line_index, expected
            )));
        }
        lines.push(group.into_values().collect::<Vec<_>>().join(" "));
    }

    Ok(TranslatedDocument::new(lines, trailing_newline))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(line_index: usize, position: usize, text: &str) -> TranslationResult {
        TranslationResult {
            line_index,
            position,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_reassemble_shouldOrderByPositionNotArrival() {
        let results = vec![result(0, 2, "c"), result(1, 0, ""), result(0, 0, "a"), result(0, 1, "b")];
        let doc = reassemble(2, results, false).unwrap();
        assert_eq!(doc.lines(), &["a b c".to_string(), String::new()]);
    }

    #[test]
    fn test_reassemble_withUncoveredLine_shouldFail() {
        let err = reassemble(2, vec![result(0, 0, "a")], false).unwrap_err();
        assert!(err.to_string().contains("Line 1 has no translation"));
    }

    #[test]
    fn test_reassemble_withPositionGap_shouldFail() {
        let err = reassemble(1, vec![result(0, 0, "a"), result(0, 2, "c")], false).unwrap_err();
        assert!(err.to_string().contains("missing chunk 1"));
    }

    #[test]
    fn test_reassemble_withOutOfRangeLine_shouldFail() {
        assert!(reassemble(1, vec![result(0, 0, "a"), result(5, 0, "x")], false).is_err());
    }

    #[test]
    fn test_reassemble_withDuplicatePosition_shouldFail() {
        assert!(reassemble(1, vec![result(0, 0, "a"), result(0, 0, "b")], false).is_err());
    }

    #[test]
    fn test_reassemble_withEmptyDocument_shouldProduceEmptyText() {
        let doc = reassemble(0, Vec::new(), true).unwrap();
        assert_eq!(doc.render(), "");
    }
}
