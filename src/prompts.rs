//! Prompt construction for LLM-based field extraction.
//!
//! Centralising the prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the nine wire keys in [`SCHEMA_KEYS`] and
//!    the JSON skeleton below are a hard contract with
//!    [`crate::pipeline::parse`]. Changing a key means changing exactly one
//!    place, and the tests in this module catch a drifting skeleton.
//!
//! 2. **Testability** — the builder is a pure function over the recognized
//!    text, so prompt regressions are caught without any OCR engine or LLM
//!    in the loop.
//!
//! The prompt is written in French to match the document language; the model
//! reads French card text and answers with French field values, but the JSON
//! key names are fixed identifiers.

/// The nine wire keys the model must use, in card order.
///
/// Must stay in sync with the serde renames on
/// [`crate::record::CardRecord`] and with [`JSON_SKELETON`].
pub const SCHEMA_KEYS: [&str; 9] = [
    "nomMutuelle",
    "reseauSoin",
    "categorieMutuelle",
    "numeroTeletransmission",
    "numeroAMC",
    "infoAdherents",
    "periodeValidite",
    "actesTiersPayant",
    "coordonneesMutuelle",
];

/// Human-readable labels for the nine fields, as enumerated in the prompt.
pub const FIELD_LABELS: [&str; 9] = [
    "Nom de la mutuelle",
    "Nom du réseau de soins partenaire",
    "Catégorie de la mutuelle",
    "Numéro de télétransmission",
    "Numéro AMC",
    "Informations adhérents et ayants droit",
    "Période de validité de la carte",
    "Actes bénéficiant du tiers-payant",
    "Coordonnées de la mutuelle",
];

/// Literal example skeleton embedded in the prompt.
///
/// The parser discovers fields by these exact key names, so the skeleton
/// must contain each of [`SCHEMA_KEYS`] exactly once.
pub const JSON_SKELETON: &str = r#"{
  "nomMutuelle": "Nom",
  "reseauSoin": "Réseau",
  "categorieMutuelle": "Catégorie",
  "numeroTeletransmission": "Numéro",
  "numeroAMC": "Numéro",
  "infoAdherents": "Informations",
  "periodeValidite": "Période",
  "actesTiersPayant": "Actes",
  "coordonneesMutuelle": "Coordonnées"
}"#;

/// Build the extraction prompt for a card's recognized text.
///
/// Pure function, no failure path. The text is embedded verbatim — no
/// truncation, no escaping. Very long OCR output is the caller's problem;
/// the card domain keeps transcriptions to a few hundred characters.
pub fn build_prompt(text: &str) -> String {
    let mut prompt = String::with_capacity(text.len() + JSON_SKELETON.len() + 512);

    prompt.push_str("Identifie les informations suivantes dans ce texte de carte mutuelle : \"");
    prompt.push_str(text);
    prompt.push_str("\"\n");
    for label in FIELD_LABELS {
        prompt.push_str("- ");
        prompt.push_str(label);
        prompt.push('\n');
    }
    prompt.push_str(
        "IMPORTANT: Renvoie uniquement un objet JSON valide avec exactement ces clés, \
         sans aucun autre texte :\n",
    );
    prompt.push_str(JSON_SKELETON);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_text_verbatim() {
        let text = "Mutuelle ABC\nAMC 123456\nValable 2024";
        let prompt = build_prompt(text);
        assert!(prompt.contains(text));
    }

    #[test]
    fn prompt_contains_each_schema_key_exactly_once() {
        let prompt = build_prompt("texte de carte");
        for key in SCHEMA_KEYS {
            let needle = format!("\"{key}\"");
            assert_eq!(
                prompt.matches(&needle).count(),
                1,
                "key {key} should appear exactly once"
            );
        }
    }

    #[test]
    fn prompt_lists_all_field_labels() {
        let prompt = build_prompt("");
        for label in FIELD_LABELS {
            assert!(prompt.contains(label), "missing label: {label}");
        }
    }

    #[test]
    fn skeleton_is_valid_json_with_all_keys() {
        let value: serde_json::Value = serde_json::from_str(JSON_SKELETON).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), SCHEMA_KEYS.len());
        for key in SCHEMA_KEYS {
            assert!(obj.contains_key(key), "skeleton missing key {key}");
        }
    }

    #[test]
    fn prompt_demands_json_only_output() {
        let prompt = build_prompt("x");
        assert!(prompt.contains("uniquement un objet JSON valide"));
    }
}
