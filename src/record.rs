//! Output types: the structured card record, run output, and timing stats.
//!
//! [`CardRecord`] is the nine-field contract shared between the prompt
//! builder and the response parser. The wire keys are the French camelCase
//! names the prompt's JSON skeleton teaches the model
//! (`nomMutuelle`, `numeroAMC`, …); the Rust fields use snake_case and map
//! via `#[serde(rename)]`.
//!
//! Every field is optional by design: a card photo rarely shows all nine
//! pieces of information, and the model is instructed to omit what it cannot
//! read. An absent key deserialises to `None` rather than failing the run.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The structured record extracted from a mutuelle card.
///
/// All fields are optional string values taken verbatim from the model's
/// JSON response. No validation or normalisation is applied to the values;
/// a field is either the text the model produced or `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardRecord {
    /// Mutual-insurer name.
    #[serde(rename = "nomMutuelle", skip_serializing_if = "Option::is_none")]
    pub nom_mutuelle: Option<String>,

    /// Partner care network (e.g. Kalivia, Itelis).
    #[serde(rename = "reseauSoin", skip_serializing_if = "Option::is_none")]
    pub reseau_soin: Option<String>,

    /// Insurer category.
    #[serde(rename = "categorieMutuelle", skip_serializing_if = "Option::is_none")]
    pub categorie_mutuelle: Option<String>,

    /// Teletransmission number for direct electronic claims.
    #[serde(rename = "numeroTeletransmission", skip_serializing_if = "Option::is_none")]
    pub numero_teletransmission: Option<String>,

    /// AMC (complementary health-insurer) identifier.
    #[serde(rename = "numeroAMC", skip_serializing_if = "Option::is_none")]
    pub numero_amc: Option<String>,

    /// Member and beneficiary information.
    #[serde(rename = "infoAdherents", skip_serializing_if = "Option::is_none")]
    pub info_adherents: Option<String>,

    /// Card validity period.
    #[serde(rename = "periodeValidite", skip_serializing_if = "Option::is_none")]
    pub periode_validite: Option<String>,

    /// Acts covered by direct third-party payment (tiers-payant).
    #[serde(rename = "actesTiersPayant", skip_serializing_if = "Option::is_none")]
    pub actes_tiers_payant: Option<String>,

    /// Insurer contact details.
    #[serde(rename = "coordonneesMutuelle", skip_serializing_if = "Option::is_none")]
    pub coordonnees_mutuelle: Option<String>,
}

impl CardRecord {
    /// Build a record from a decoded JSON object by exact key match.
    ///
    /// Unknown keys are ignored and missing keys stay `None`. A non-string
    /// value is out of contract but tolerated: it passes through as its JSON
    /// text rather than failing the decode (`null` counts as absent).
    pub fn from_object(map: &Map<String, Value>) -> Self {
        let field = |key: &str| -> Option<String> {
            match map.get(key) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) => Some(other.to_string()),
            }
        };

        Self {
            nom_mutuelle: field("nomMutuelle"),
            reseau_soin: field("reseauSoin"),
            categorie_mutuelle: field("categorieMutuelle"),
            numero_teletransmission: field("numeroTeletransmission"),
            numero_amc: field("numeroAMC"),
            info_adherents: field("infoAdherents"),
            periode_validite: field("periodeValidite"),
            actes_tiers_payant: field("actesTiersPayant"),
            coordonnees_mutuelle: field("coordonneesMutuelle"),
        }
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }

    /// Number of fields carrying a value.
    pub fn filled_count(&self) -> usize {
        self.fields().iter().filter(|(_, v)| v.is_some()).count()
    }

    /// The nine fields with their human-readable French labels, in card order.
    ///
    /// Used by the CLI to render the result table; the labels match the
    /// field list embedded in the prompt.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 9] {
        [
            ("Nom de la mutuelle", self.nom_mutuelle.as_deref()),
            ("Réseau de soins partenaire", self.reseau_soin.as_deref()),
            ("Catégorie de la mutuelle", self.categorie_mutuelle.as_deref()),
            (
                "Numéro de télétransmission",
                self.numero_teletransmission.as_deref(),
            ),
            ("Numéro AMC", self.numero_amc.as_deref()),
            ("Informations adhérents", self.info_adherents.as_deref()),
            ("Période de validité", self.periode_validite.as_deref()),
            (
                "Actes bénéficiant du tiers-payant",
                self.actes_tiers_payant.as_deref(),
            ),
            (
                "Coordonnées de la mutuelle",
                self.coordonnees_mutuelle.as_deref(),
            ),
        ]
    }
}

/// The complete result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// The structured record, when the response parsed successfully.
    pub record: Option<CardRecord>,

    /// The raw OCR transcription the prompt was built from.
    pub recognized_text: String,

    /// The parse failure, when the lenient policy swallowed one.
    ///
    /// `record` and `parse_error` are mutually exclusive: exactly one of the
    /// two is `Some` after a run that reached the parsing stage.
    pub parse_error: Option<ParseError>,

    /// Timing and size statistics for the run.
    pub stats: ExtractionStats,
}

/// Timing and size statistics for a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Wall-clock time spent in the OCR engine.
    pub ocr_duration_ms: u64,
    /// Wall-clock time spent waiting on the completion service.
    pub llm_duration_ms: u64,
    /// Total run time, including prompt construction and parsing.
    pub total_duration_ms: u64,
    /// Character count of the OCR transcription.
    pub recognized_chars: usize,
    /// Character count of the raw model response.
    pub response_chars: usize,
}
