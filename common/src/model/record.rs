use serde::{Deserialize, Serialize};

/// One imported IN line as stored in `security_data` and rendered in the
/// dashboard table.
///
/// `pourcentage_in` is the line's share of the whole stored parc; it is
/// recomputed server-side after every import or purge so the shares always
/// reflect the current table, not the table at insert time. Rows are created
/// by import, never edited, and only deleted en masse by a purge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRecord {
    pub id: i64,
    pub operateur: String,
    pub nombre_in: u32,
    pub pourcentage_in: f64,
    pub statut: String,
    pub fa_statut: String,
    pub date: String,
    pub id_lin: String,
}

/// Detail row for a single IN, joined to [`SecurityRecord`] by `id_lin`.
/// Only exists to back the detail export; the join is informal (no FK).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedInRecord {
    pub id: i64,
    pub id_lin: String,
    pub numero_in: String,
    pub date_activation: String,
    pub statut_detail: String,
    pub type_service: String,
    pub region: String,
}

/// Lifecycle status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statut {
    Actif,
    Inactif,
    Suspendu,
}

impl Statut {
    pub fn label(self) -> &'static str {
        match self {
            Statut::Actif => "Actif",
            Statut::Inactif => "Inactif",
            Statut::Suspendu => "Suspendu",
        }
    }

    /// Maps a raw source cell onto a known label. Unknown values keep the
    /// record but fall back to `Inactif`, matching how the source data treats
    /// unrecognised statuses.
    pub fn from_raw(raw: &str) -> Statut {
        match raw.trim().to_uppercase().as_str() {
            "ACTIF" | "ACTIVE" | "ENABLED" => Statut::Actif,
            "SUSPENDU" | "SUSPENDED" | "LOCKED" => Statut::Suspendu,
            _ => Statut::Inactif,
        }
    }
}

/// Two-factor-authentication status label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaStatut {
    #[serde(rename = "Activé")]
    Active,
    #[serde(rename = "Désactivé")]
    Desactive,
    #[serde(rename = "En attente")]
    EnAttente,
}

impl FaStatut {
    pub fn label(self) -> &'static str {
        match self {
            FaStatut::Active => "Activé",
            FaStatut::Desactive => "Désactivé",
            FaStatut::EnAttente => "En attente",
        }
    }

    pub fn from_raw(raw: &str) -> FaStatut {
        match raw.trim().to_uppercase().as_str() {
            "ACTIVÉ" | "ACTIVE" | "ENABLED" | "ON" | "TRUE" | "1" => FaStatut::Active,
            "EN ATTENTE" | "PENDING" => FaStatut::EnAttente,
            _ => FaStatut::Desactive,
        }
    }
}
