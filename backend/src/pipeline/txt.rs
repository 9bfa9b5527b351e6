//! Parser for the pipe-delimited TXT dumps produced by the upstream export.
//!
//! The dumps are fixed-layout reports: decoration lines made of `-+|` runs,
//! one header line naming the columns, then one record per line. Cells are
//! `|`-separated and padded with spaces; a cell of `...` or bare separator
//! characters carries no data.

use rayon::prelude::*;
use std::io::BufRead;

/// Lines handled per parallel batch; progress is reported between batches.
const BATCH_SIZE: usize = 50_000;

/// One data row lifted out of the dump, still unjoined (no operator yet).
#[derive(Debug, Clone)]
pub struct RawRow {
    pub telephone: String,
    pub statut: String,
    pub fa_statut: String,
    pub date: String,
    pub nombre_in: u32,
    pub type_service: String,
    pub region: String,
}

/// Column positions resolved from the header line.
struct Columns {
    telephone: usize,
    statut: Option<usize>,
    fa_statut: Option<usize>,
    date: Option<usize>,
    nombre_in: Option<usize>,
    type_service: Option<usize>,
    region: Option<usize>,
    width: usize,
}

/// True for separator/decoration lines (`----+----`, `|    |`, blank).
fn is_decoration(line: &str) -> bool {
    line.chars()
        .all(|c| c == '-' || c == '+' || c == '|' || c.is_whitespace())
}

/// A cell counts as data only if it holds something besides layout
/// characters; `...` is the dump's explicit empty marker.
fn has_meaningful_content(value: &str) -> bool {
    if value == "..." {
        return false;
    }
    value
        .chars()
        .any(|c| !c.is_whitespace() && c != '-' && c != '|' && c != '+' && c != '.')
}

fn split_cells(line: &str) -> Vec<String> {
    line.split('|').map(|cell| cell.trim().to_string()).collect()
}

fn header_columns(line: &str) -> Vec<String> {
    split_cells(line)
        .into_iter()
        .filter(|cell| !cell.is_empty() && has_meaningful_content(cell))
        .collect()
}

fn find_column(names: &[String], wanted: &str) -> Option<usize> {
    names
        .iter()
        .position(|name| name.eq_ignore_ascii_case(wanted))
}

impl Columns {
    fn resolve(names: &[String]) -> Result<Columns, String> {
        let telephone = find_column(names, "TELEPHONE")
            .ok_or_else(|| "TELEPHONE column not found in data file".to_string())?;
        Ok(Columns {
            telephone,
            statut: find_column(names, "USER_STATUS"),
            fa_statut: find_column(names, "2FA_STATUS"),
            date: find_column(names, "CREATED_DATE"),
            nombre_in: find_column(names, "NOMBRE_IN"),
            type_service: find_column(names, "TYPE_SERVICE"),
            region: find_column(names, "REGION"),
            width: names.len(),
        })
    }

    fn cell<'a>(&self, cells: &'a [String], index: Option<usize>) -> &'a str {
        index
            .and_then(|i| cells.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Keeps digits only: strips `+`, spaces, dots and grouping characters.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    // French numbers arrive with their country code; domestic form is stored.
    if digits.len() > 9 && digits.starts_with("33") {
        digits[2..].to_string()
    } else {
        digits
    }
}

/// Validates a source date down to ISO `YYYY-MM-DD`. Years before 1900 and
/// malformed values are rejected, as in the upstream cleaner.
pub fn validate_date(raw: &str) -> Option<String> {
    let candidate = raw.trim().get(..10)?;
    let bytes = candidate.as_bytes();
    let digits_at = |range: std::ops::Range<usize>| {
        bytes[range.clone()].iter().all(u8::is_ascii_digit)
    };
    if !(digits_at(0..4) && bytes[4] == b'-' && digits_at(5..7) && bytes[7] == b'-' && digits_at(8..10))
    {
        return None;
    }
    let year: u32 = candidate[..4].parse().ok()?;
    let month: u32 = candidate[5..7].parse().ok()?;
    let day: u32 = candidate[8..10].parse().ok()?;
    if year < 1900 || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some(candidate.to_string())
}

fn parse_row(line: &str, columns: &Columns) -> Option<RawRow> {
    let mut cells = split_cells(line);
    if !cells.iter().any(|cell| has_meaningful_content(cell)) {
        return None;
    }
    // The first and last cells of a `|`-framed line are empty framing cells.
    if cells.first().is_some_and(|c| c.is_empty()) {
        cells.remove(0);
    }
    cells.resize(columns.width, String::new());

    let telephone = normalize_phone(&cells[columns.telephone]);
    if telephone.is_empty() {
        return None;
    }

    let nombre_in = columns
        .cell(&cells, columns.nombre_in)
        .parse::<u32>()
        .unwrap_or(1);

    Some(RawRow {
        telephone,
        statut: columns.cell(&cells, columns.statut).to_string(),
        fa_statut: columns.cell(&cells, columns.fa_statut).to_string(),
        date: columns.cell(&cells, columns.date).to_string(),
        nombre_in,
        type_service: columns.cell(&cells, columns.type_service).to_string(),
        region: columns.cell(&cells, columns.region).to_string(),
    })
}

/// Parses the whole dump. `progress` receives the running count of parsed
/// rows between batches; batches themselves run on the rayon pool.
pub fn parse<R: BufRead>(
    reader: R,
    mut progress: impl FnMut(u32),
) -> Result<Vec<RawRow>, String> {
    let mut lines = reader.lines();

    let columns = loop {
        let line = match lines.next() {
            Some(line) => line.map_err(|e| e.to_string())?,
            None => return Err("data file is empty".to_string()),
        };
        if is_decoration(&line) {
            continue;
        }
        break Columns::resolve(&header_columns(&line))?;
    };

    let mut rows = Vec::new();
    let mut batch: Vec<String> = Vec::with_capacity(BATCH_SIZE);

    let mut flush = |batch: &mut Vec<String>, rows: &mut Vec<RawRow>| {
        let parsed: Vec<RawRow> = batch
            .par_iter()
            .filter_map(|line| parse_row(line, &columns))
            .collect();
        rows.extend(parsed);
        batch.clear();
    };

    for line in lines {
        let line = line.map_err(|e| e.to_string())?;
        if is_decoration(&line) {
            continue;
        }
        batch.push(line);
        if batch.len() == BATCH_SIZE {
            flush(&mut batch, &mut rows);
            progress(rows.len() as u32);
        }
    }
    if !batch.is_empty() {
        flush(&mut batch, &mut rows);
        progress(rows.len() as u32);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DUMP: &str = "\
+-----------+-------------+------------+--------------+
| TELEPHONE | USER_STATUS | 2FA_STATUS | CREATED_DATE |
+-----------+-------------+------------+--------------+
| +33601020304 | ACTIF | ENABLED | 2025-02-15 |
| 0700000001   | SUSPENDU | PENDING | 2025-01-10 |
|     ...      | ...      | ...     | ...        |
+-----------+-------------+------------+--------------+
";

    #[test]
    fn parses_rows_and_skips_decoration() {
        let rows = parse(Cursor::new(DUMP), |_| {}).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].telephone, "601020304");
        assert_eq!(rows[0].statut, "ACTIF");
        assert_eq!(rows[1].telephone, "0700000001");
    }

    #[test]
    fn header_is_required() {
        let err = parse(Cursor::new("+----+\n+----+\n"), |_| {}).unwrap_err();
        assert!(err.contains("empty"));
    }

    #[test]
    fn missing_telephone_column_fails() {
        let err = parse(Cursor::new("| NAME | AGE |\n| a | 1 |\n"), |_| {}).unwrap_err();
        assert!(err.contains("TELEPHONE"));
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(normalize_phone("+33 6 01 02 03 04"), "601020304");
        assert_eq!(normalize_phone("0601020304"), "0601020304");
        assert_eq!(normalize_phone("41791234567"), "41791234567");
        assert_eq!(normalize_phone("..."), "");
    }

    #[test]
    fn date_validation() {
        assert_eq!(
            validate_date("2025-02-15 10:30:00").as_deref(),
            Some("2025-02-15")
        );
        assert_eq!(validate_date("1899-12-31"), None);
        assert_eq!(validate_date("15/02/2025"), None);
        assert_eq!(validate_date(""), None);
    }

    #[test]
    fn rows_without_content_are_dropped() {
        let dump = "| TELEPHONE | USER_STATUS |\n| --- | --- |\n| ... | ... |\n";
        let rows = parse(Cursor::new(dump), |_| {}).unwrap();
        assert!(rows.is_empty());
    }
}
