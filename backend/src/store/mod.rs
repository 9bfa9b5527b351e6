//! SQLite persistence for imported records.
//!
//! Connections are opened per operation against the configured database file;
//! the schema is created on first open. Query predicates are built once from
//! the typed [`FilterCriteria`] so every endpoint filters identically.

use common::model::filter::{FilterCriteria, LimitOp};
use common::model::record::{DetailedInRecord, SecurityRecord};
use common::model::responses::{FilterOptions, StatPoint};
use regex::Regex;
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS security_data (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    id_lin         TEXT NOT NULL UNIQUE,
    operateur      TEXT NOT NULL,
    nombre_in      INTEGER NOT NULL,
    pourcentage_in REAL NOT NULL DEFAULT 0,
    statut         TEXT NOT NULL,
    fa_statut      TEXT NOT NULL,
    date           TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS in_details (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    id_lin          TEXT NOT NULL,
    numero_in       TEXT NOT NULL UNIQUE,
    date_activation TEXT NOT NULL,
    statut_detail   TEXT NOT NULL,
    type_service    TEXT NOT NULL,
    region          TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_in_details_id_lin ON in_details(id_lin);
CREATE TABLE IF NOT EXISTS import_log (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    file_name      TEXT NOT NULL,
    md5            TEXT NOT NULL,
    rows_processed INTEGER NOT NULL,
    created_at     TEXT NOT NULL
);
";

/// Opens the database, creating the schema if needed.
pub fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// A parsed line ready for insertion; `id_lin` is assigned at insert time.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub operateur: String,
    pub statut: String,
    pub fa_statut: String,
    pub date: String,
    pub nombre_in: u32,
    pub numero_in: String,
    pub type_service: String,
    pub region: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InsertSummary {
    pub inserted: u32,
    /// Rows skipped because their `numero_in` is already stored.
    pub duplicates: u32,
}

/// Inserts records in one transaction, skipping rows whose `numero_in` is
/// already present. Each inserted row gets a fresh `LIN`-prefixed line id
/// shared by its `security_data` and `in_details` rows.
pub fn insert_records(
    conn: &mut Connection,
    rows: &[NewRecord],
) -> rusqlite::Result<InsertSummary> {
    let tx = conn.transaction()?;
    let mut summary = InsertSummary::default();

    let mut next_lin: i64 = tx.query_row(
        "SELECT COALESCE(MAX(id), 0) + 1 FROM security_data",
        [],
        |row| row.get(0),
    )?;

    {
        let mut exists = tx.prepare("SELECT 1 FROM in_details WHERE numero_in = ?1 LIMIT 1")?;
        let mut insert_data = tx.prepare(
            "INSERT INTO security_data (id_lin, operateur, nombre_in, statut, fa_statut, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut insert_detail = tx.prepare(
            "INSERT INTO in_details
                 (id_lin, numero_in, date_activation, statut_detail, type_service, region)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;

        for row in rows {
            if exists.exists(params![row.numero_in])? {
                summary.duplicates += 1;
                continue;
            }

            let id_lin = format!("LIN{:06}", next_lin);
            next_lin += 1;

            insert_data.execute(params![
                id_lin,
                row.operateur,
                row.nombre_in,
                row.statut,
                row.fa_statut,
                row.date,
            ])?;
            insert_detail.execute(params![
                id_lin,
                row.numero_in,
                row.date,
                row.statut,
                row.type_service,
                row.region,
            ])?;
            summary.inserted += 1;
        }
    }

    tx.commit()?;
    Ok(summary)
}

/// Recomputes every row's share of the stored parc. Run after each import or
/// purge so percentages always total the current table.
pub fn recompute_percentages(conn: &Connection) -> rusqlite::Result<()> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(nombre_in), 0) FROM security_data",
        [],
        |row| row.get(0),
    )?;
    if total == 0 {
        return Ok(());
    }
    conn.execute(
        "UPDATE security_data SET pourcentage_in = ROUND(nombre_in * 100.0 / ?1, 2)",
        params![total],
    )?;
    Ok(())
}

pub fn has_data(conn: &Connection) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM security_data", [], |row| row.get(0))?;
    Ok(count > 0)
}

pub fn record_count(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("SELECT COUNT(*) FROM security_data", [], |row| row.get(0))
}

/// Builds the shared `WHERE` tail for the typed filter criteria. The returned
/// clause is appended to a `WHERE 1=1` base; parameters are positional.
pub fn filter_clause(criteria: &FilterCriteria) -> (String, Vec<Box<dyn ToSql>>) {
    let mut sql = String::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(statut) = &criteria.statut {
        sql.push_str(" AND statut = ?");
        values.push(Box::new(statut.clone()));
    }
    if let Some(fa_statut) = &criteria.fa_statut {
        sql.push_str(" AND fa_statut = ?");
        values.push(Box::new(fa_statut.clone()));
    }
    if let Some(limite) = &criteria.limite {
        match limite.op {
            LimitOp::LessThan => sql.push_str(" AND pourcentage_in < ?"),
            LimitOp::GreaterThan => sql.push_str(" AND pourcentage_in > ?"),
        }
        values.push(Box::new(limite.value));
    }
    if let Some(date_min) = &criteria.date_min {
        sql.push_str(" AND date >= ?");
        values.push(Box::new(date_min.clone()));
    }
    if let Some(date_max) = &criteria.date_max {
        sql.push_str(" AND date <= ?");
        values.push(Box::new(date_max.clone()));
    }
    if let Some(annee) = criteria.annee {
        sql.push_str(" AND substr(date, 1, 4) = ?");
        values.push(Box::new(format!("{:04}", annee)));
    }

    (sql, values)
}

/// Filtered records, most recent first. `page` is 1-based.
pub fn query_records(
    conn: &Connection,
    criteria: &FilterCriteria,
    page: Option<(u32, u32)>,
) -> rusqlite::Result<Vec<SecurityRecord>> {
    let (clause, values) = filter_clause(criteria);
    let mut sql = format!(
        "SELECT id, operateur, nombre_in, pourcentage_in, statut, fa_statut, date, id_lin
         FROM security_data WHERE 1=1{clause}
         ORDER BY date DESC, id DESC"
    );
    if let Some((page, page_size)) = page {
        let offset = (page.max(1) - 1) * page_size;
        sql.push_str(&format!(" LIMIT {page_size} OFFSET {offset}"));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter().map(|v| v.as_ref())), |row| {
        Ok(SecurityRecord {
            id: row.get(0)?,
            operateur: row.get(1)?,
            nombre_in: row.get(2)?,
            pourcentage_in: row.get(3)?,
            statut: row.get(4)?,
            fa_statut: row.get(5)?,
            date: row.get(6)?,
            id_lin: row.get(7)?,
        })
    })?;
    rows.collect()
}

pub fn count_filtered(conn: &Connection, criteria: &FilterCriteria) -> rusqlite::Result<u32> {
    let (clause, values) = filter_clause(criteria);
    let sql = format!("SELECT COUNT(*) FROM security_data WHERE 1=1{clause}");
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row(params_from_iter(values.iter().map(|v| v.as_ref())), |row| {
        row.get(0)
    })
}

/// Per-operator aggregate for the summary export: IN count over the filtered
/// rows, percentage against the whole (unfiltered) parc.
pub fn operator_summary(
    conn: &Connection,
    criteria: &FilterCriteria,
) -> rusqlite::Result<Vec<(String, u32, f64)>> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(nombre_in), 0) FROM security_data",
        [],
        |row| row.get(0),
    )?;
    if total == 0 {
        return Ok(Vec::new());
    }

    let (clause, mut values) = filter_clause(criteria);
    let sql = format!(
        "SELECT operateur, SUM(nombre_in) AS total_in,
                ROUND(SUM(nombre_in) * 100.0 / ?, 2)
         FROM security_data WHERE 1=1{clause}
         GROUP BY operateur
         ORDER BY total_in DESC"
    );
    values.insert(0, Box::new(total));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter().map(|v| v.as_ref())), |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    })?;
    rows.collect()
}

/// Detail rows for every line matching the criteria, via the informal
/// `id_lin` join.
pub fn detailed_records(
    conn: &Connection,
    criteria: &FilterCriteria,
) -> rusqlite::Result<Vec<DetailedInRecord>> {
    let (clause, values) = filter_clause(criteria);
    let sql = format!(
        "SELECT d.id, d.id_lin, d.numero_in, d.date_activation,
                d.statut_detail, d.type_service, d.region
         FROM in_details d
         WHERE d.id_lin IN (SELECT id_lin FROM security_data WHERE 1=1{clause})
         ORDER BY d.id_lin, d.numero_in"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter().map(|v| v.as_ref())), |row| {
        Ok(DetailedInRecord {
            id: row.get(0)?,
            id_lin: row.get(1)?,
            numero_in: row.get(2)?,
            date_activation: row.get(3)?,
            statut_detail: row.get(4)?,
            type_service: row.get(5)?,
            region: row.get(6)?,
        })
    })?;
    rows.collect()
}

/// Chart data: top operators by share, or status / 2FA distribution.
pub fn stats(conn: &Connection, kind: &str) -> rusqlite::Result<Vec<StatPoint>> {
    let sql = match kind {
        "operators" => {
            "SELECT operateur AS name, ROUND(SUM(pourcentage_in), 2) AS value
             FROM security_data GROUP BY operateur ORDER BY value DESC LIMIT 5"
        }
        "status" => {
            "SELECT statut AS name,
                    ROUND(COUNT(*) * 100.0 / (SELECT COUNT(*) FROM security_data), 2) AS value
             FROM security_data GROUP BY statut ORDER BY value DESC"
        }
        "2fa" => {
            "SELECT fa_statut AS name,
                    ROUND(COUNT(*) * 100.0 / (SELECT COUNT(*) FROM security_data), 2) AS value
             FROM security_data GROUP BY fa_statut ORDER BY value DESC"
        }
        _ => return Ok(Vec::new()),
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(StatPoint {
            name: row.get(0)?,
            value: row.get(1)?,
        })
    })?;
    rows.collect()
}

pub fn filter_options(conn: &Connection) -> rusqlite::Result<FilterOptions> {
    fn distinct(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect()
    }

    Ok(FilterOptions {
        statuts: distinct(
            conn,
            "SELECT DISTINCT statut FROM security_data ORDER BY statut",
        )?,
        fa_statuts: distinct(
            conn,
            "SELECT DISTINCT fa_statut FROM security_data ORDER BY fa_statut",
        )?,
        annees: distinct(
            conn,
            "SELECT DISTINCT substr(date, 1, 4) FROM security_data ORDER BY 1 DESC",
        )?,
        message: None,
    })
}

/// Deletes every record; import history is kept. Idempotent.
pub fn purge_records(conn: &Connection) -> rusqlite::Result<usize> {
    let deleted = conn.execute("DELETE FROM security_data", [])?;
    conn.execute("DELETE FROM in_details", [])?;
    Ok(deleted)
}

pub fn find_import(conn: &Connection, md5: &str) -> rusqlite::Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT file_name FROM import_log WHERE md5 = ?1 LIMIT 1")?;
    let mut rows = stmt.query_map(params![md5], |row| row.get(0))?;
    rows.next().transpose()
}

pub fn record_import(
    conn: &Connection,
    file_name: &str,
    md5: &str,
    rows_processed: u32,
    created_at: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO import_log (file_name, md5, rows_processed, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![file_name, md5, rows_processed, created_at],
    )?;
    Ok(())
}

/// Identifier rule for `load_data` target tables.
pub fn is_valid_table_name(name: &str) -> bool {
    let re = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("table name regex");
    re.is_match(name)
}

/// Snapshots the current records into the named table, replacing any previous
/// snapshot of the same name. The name must pass [`is_valid_table_name`].
pub fn snapshot_to_table(conn: &Connection, table_name: &str) -> rusqlite::Result<u32> {
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS \"{table_name}\";
         CREATE TABLE \"{table_name}\" AS
             SELECT id, id_lin, operateur, nombre_in, pourcentage_in,
                    statut, fa_statut, date
             FROM security_data;"
    ))?;
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table_name}\""), [], |row| {
        row.get(0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::filter::LimitFilter;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn
    }

    fn record(numero: &str, operateur: &str, statut: &str, date: &str) -> NewRecord {
        NewRecord {
            operateur: operateur.to_string(),
            statut: statut.to_string(),
            fa_statut: "Activé".to_string(),
            date: date.to_string(),
            nombre_in: 10,
            numero_in: numero.to_string(),
            type_service: "Mobile".to_string(),
            region: "IDF".to_string(),
        }
    }

    #[test]
    fn insert_skips_duplicate_numbers() {
        let mut conn = test_conn();
        let rows = vec![
            record("0601020304", "Orange", "Actif", "2025-02-15"),
            record("0601020304", "Orange", "Actif", "2025-02-15"),
            record("0700000001", "SFR", "Inactif", "2025-01-10"),
        ];
        let summary = insert_records(&mut conn, &rows).unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(record_count(&conn).unwrap(), 2);
    }

    #[test]
    fn percentages_total_the_parc() {
        let mut conn = test_conn();
        let mut rows = vec![
            record("0601", "Orange", "Actif", "2025-02-15"),
            record("0602", "SFR", "Actif", "2025-02-14"),
        ];
        rows[0].nombre_in = 30;
        rows[1].nombre_in = 10;
        insert_records(&mut conn, &rows).unwrap();
        recompute_percentages(&conn).unwrap();

        let records = query_records(&conn, &FilterCriteria::default(), None).unwrap();
        let total: f64 = records.iter().map(|r| r.pourcentage_in).sum();
        assert!((total - 100.0).abs() < 0.1);
        assert!((records[0].pourcentage_in - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn filters_compose() {
        let mut conn = test_conn();
        insert_records(
            &mut conn,
            &[
                record("0601", "Orange", "Actif", "2025-02-15"),
                record("0602", "SFR", "Inactif", "2025-01-10"),
                record("0603", "Free", "Actif", "2024-06-01"),
            ],
        )
        .unwrap();
        recompute_percentages(&conn).unwrap();

        let criteria = FilterCriteria {
            statut: Some("Actif".into()),
            annee: Some(2025),
            ..Default::default()
        };
        let records = query_records(&conn, &criteria, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operateur, "Orange");

        let criteria = FilterCriteria {
            limite: Some(LimitFilter {
                op: LimitOp::GreaterThan,
                value: 50.0,
            }),
            ..Default::default()
        };
        assert_eq!(count_filtered(&conn, &criteria).unwrap(), 0);
    }

    #[test]
    fn records_sort_most_recent_first() {
        let mut conn = test_conn();
        insert_records(
            &mut conn,
            &[
                record("0601", "Orange", "Actif", "2024-06-01"),
                record("0602", "SFR", "Actif", "2025-02-15"),
            ],
        )
        .unwrap();
        let records = query_records(&conn, &FilterCriteria::default(), None).unwrap();
        assert_eq!(records[0].date, "2025-02-15");
    }

    #[test]
    fn detail_rows_follow_the_lin_join() {
        let mut conn = test_conn();
        insert_records(
            &mut conn,
            &[
                record("0601", "Orange", "Actif", "2025-02-15"),
                record("0602", "SFR", "Inactif", "2025-01-10"),
            ],
        )
        .unwrap();

        let criteria = FilterCriteria {
            statut: Some("Actif".into()),
            ..Default::default()
        };
        let details = detailed_records(&conn, &criteria).unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].numero_in, "0601");
        assert!(details[0].id_lin.starts_with("LIN"));
    }

    #[test]
    fn purge_is_idempotent() {
        let mut conn = test_conn();
        insert_records(&mut conn, &[record("0601", "Orange", "Actif", "2025-02-15")]).unwrap();
        assert_eq!(purge_records(&conn).unwrap(), 1);
        assert_eq!(purge_records(&conn).unwrap(), 0);
        assert!(!has_data(&conn).unwrap());
    }

    #[test]
    fn snapshot_copies_current_records() {
        let mut conn = test_conn();
        insert_records(
            &mut conn,
            &[
                record("0601", "Orange", "Actif", "2025-02-15"),
                record("0602", "SFR", "Actif", "2025-02-14"),
            ],
        )
        .unwrap();
        assert!(is_valid_table_name("archive_2025"));
        assert!(!is_valid_table_name("bad name; drop"));
        assert_eq!(snapshot_to_table(&conn, "archive_2025").unwrap(), 2);
    }

    #[test]
    fn open_creates_the_schema_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.sqlite");
        {
            let mut conn = open(&path).unwrap();
            insert_records(&mut conn, &[record("0601", "Orange", "Actif", "2025-02-15")]).unwrap();
        }
        // Reopening an existing database keeps its data.
        let conn = open(&path).unwrap();
        assert!(has_data(&conn).unwrap());
    }

    #[test]
    fn import_log_round_trip() {
        let conn = test_conn();
        assert!(find_import(&conn, "abc123").unwrap().is_none());
        record_import(&conn, "part1.txt", "abc123", 42, "2025-08-06 10:00:00").unwrap();
        assert_eq!(
            find_import(&conn, "abc123").unwrap().as_deref(),
            Some("part1.txt")
        );
    }
}
