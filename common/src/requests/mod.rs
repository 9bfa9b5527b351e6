use serde::Deserialize;

use crate::model::filter::{FilterCriteria, LimitFilter, LimitOp};

/// Raw filter parameters as they arrive on the query string of the export and
/// data endpoints. Everything is optional text; `"all"` and `"none"` are
/// sentinel values meaning "not filtered". Call [`RawFilterQuery::normalize`]
/// to obtain the typed criteria.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawFilterQuery {
    pub statut: Option<String>,
    pub fa_statut: Option<String>,
    pub limite_type: Option<String>,
    pub limite_valeur: Option<String>,
    pub date_min: Option<String>,
    pub date_max: Option<String>,
    pub annee: Option<String>,
}

fn meaningful(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "all")
        .map(str::to_string)
}

impl RawFilterQuery {
    /// Single normalization point for the loosely-typed query string.
    ///
    /// Sentinels (`all`, `none`, empty) become absent fields; the percentage
    /// limit is kept only when both its operator and a parseable value are
    /// present; `annee` is kept only when it parses as an integer year.
    pub fn normalize(&self) -> FilterCriteria {
        let limite = match (self.limite_type.as_deref(), &self.limite_valeur) {
            (Some("lt"), Some(v)) => v.trim().parse::<f64>().ok().map(|value| LimitFilter {
                op: LimitOp::LessThan,
                value,
            }),
            (Some("gt"), Some(v)) => v.trim().parse::<f64>().ok().map(|value| LimitFilter {
                op: LimitOp::GreaterThan,
                value,
            }),
            _ => None,
        };

        FilterCriteria {
            statut: meaningful(&self.statut),
            fa_statut: meaningful(&self.fa_statut),
            limite,
            date_min: meaningful(&self.date_min),
            date_max: meaningful(&self.date_max),
            annee: meaningful(&self.annee).and_then(|a| a.parse::<i32>().ok()),
        }
    }
}
