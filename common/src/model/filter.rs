use serde::{Deserialize, Serialize};

/// Comparison direction for the percentage limit filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitOp {
    LessThan,
    GreaterThan,
}

/// Threshold on `pourcentage_in`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitFilter {
    pub op: LimitOp,
    pub value: f64,
}

/// Typed, normalized filter criteria shared by the export and data endpoints.
///
/// Produced from the loose query string by
/// [`crate::requests::RawFilterQuery::normalize`]; every field is genuinely
/// optional and sentinel-free. Dates are ISO `YYYY-MM-DD` strings and compare
/// lexicographically, which for this format is date order.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub statut: Option<String>,
    pub fa_statut: Option<String>,
    pub limite: Option<LimitFilter>,
    pub date_min: Option<String>,
    pub date_max: Option<String>,
    pub annee: Option<i32>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.statut.is_none()
            && self.fa_statut.is_none()
            && self.limite.is_none()
            && self.date_min.is_none()
            && self.date_max.is_none()
            && self.annee.is_none()
    }
}
