//! Operator mapping loaded from the MAJNUM CSV.
//!
//! The file is `;`-separated and ships as Latin-1; the two columns that
//! matter are `EZABPQM` (number-range prefix) and `Mnémo` (operator short
//! name). Prefixes run from 3 to 7 digits; a number belongs to the operator
//! of its longest matching prefix.

use std::collections::HashMap;
use std::io::Read;

const MIN_PREFIX_LEN: usize = 3;
const MAX_PREFIX_LEN: usize = 7;

/// Operator applied when no prefix matches.
pub const UNKNOWN_OPERATOR: &str = "Inconnu";

#[derive(Debug, Default)]
pub struct OperatorTable {
    by_prefix: HashMap<String, String>,
}

impl OperatorTable {
    /// Reads the mapping CSV. Header columns are located by name; the mnemo
    /// header is matched by prefix because its accent does not survive the
    /// file's Latin-1 encoding.
    pub fn load<R: Read>(reader: R) -> Result<OperatorTable, String> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .has_headers(false)
            .from_reader(reader);

        let mut records = csv_reader.byte_records();
        let header = match records.next() {
            Some(record) => record.map_err(|e| e.to_string())?,
            None => return Err("mapping file is empty".to_string()),
        };

        let header_cells: Vec<String> = header
            .iter()
            .map(|cell| String::from_utf8_lossy(cell).trim().to_string())
            .collect();
        let prefix_col = header_cells
            .iter()
            .position(|name| name.eq_ignore_ascii_case("EZABPQM"))
            .ok_or_else(|| "EZABPQM column not found in mapping file".to_string())?;
        let operator_col = header_cells
            .iter()
            .position(|name| name.starts_with("Mn"))
            .ok_or_else(|| "operator column not found in mapping file".to_string())?;

        let mut by_prefix = HashMap::new();
        for record in records {
            let record = record.map_err(|e| e.to_string())?;
            let prefix = record
                .get(prefix_col)
                .map(|cell| String::from_utf8_lossy(cell).trim().to_string())
                .unwrap_or_default();
            let operator = record
                .get(operator_col)
                .map(|cell| String::from_utf8_lossy(cell).trim().to_string())
                .unwrap_or_default();

            if prefix.is_empty()
                || operator.is_empty()
                || !prefix.bytes().all(|b| b.is_ascii_digit())
                || !(MIN_PREFIX_LEN..=MAX_PREFIX_LEN).contains(&prefix.len())
            {
                continue;
            }
            by_prefix.insert(prefix, operator);
        }

        if by_prefix.is_empty() {
            return Err("mapping file holds no usable prefixes".to_string());
        }
        Ok(OperatorTable { by_prefix })
    }

    pub fn len(&self) -> usize {
        self.by_prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_prefix.is_empty()
    }

    /// Longest-prefix match, 7 digits down to 3.
    pub fn operator_for(&self, phone: &str) -> Option<&str> {
        for len in (MIN_PREFIX_LEN..=MAX_PREFIX_LEN).rev() {
            if phone.len() < len {
                continue;
            }
            if let Some(operator) = self.by_prefix.get(&phone[..len]) {
                return Some(operator.as_str());
            }
        }
        None
    }

    /// Operator label for a number, falling back to [`UNKNOWN_OPERATOR`].
    pub fn operator_or_unknown(&self, phone: &str) -> &str {
        self.operator_for(phone).unwrap_or(UNKNOWN_OPERATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const MAPPING: &str = "\
EZABPQM;Tranche_Debut;Tranche_Fin;Mnemo;Date_Attribution
601;0601000000;0601999999;ORAN;2010-01-01
60102;0601020000;0601029999;SFR;2012-01-01
700;0700000000;0700999999;FREE;2015-01-01
bad;;;IGNORED;
";

    fn table() -> OperatorTable {
        OperatorTable::load(Cursor::new(MAPPING)).unwrap()
    }

    #[test]
    fn longest_prefix_wins() {
        let table = table();
        assert_eq!(table.operator_for("60102030405"), Some("SFR"));
        assert_eq!(table.operator_for("60199999999"), Some("ORAN"));
        assert_eq!(table.operator_for("70011122233"), Some("FREE"));
    }

    #[test]
    fn unmatched_numbers_are_unknown() {
        let table = table();
        assert_eq!(table.operator_for("41791234567"), None);
        assert_eq!(table.operator_or_unknown("41791234567"), UNKNOWN_OPERATOR);
    }

    #[test]
    fn invalid_prefixes_are_ignored() {
        assert_eq!(table().len(), 3);
    }

    #[test]
    fn missing_columns_fail() {
        let err = OperatorTable::load(Cursor::new("a;b;c\n1;2;3\n")).unwrap_err();
        assert!(err.contains("EZABPQM"));
    }
}
