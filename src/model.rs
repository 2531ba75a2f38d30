//! Domain entities as stored in the record collections. Wire names keep the
//! product's French vocabulary (camelCase), matching what the UI persists.
//! Extra stored fields are ignored on read; writes never go through these
//! types except where an engine creates a record itself.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatutEleve {
    #[serde(rename = "Actif")]
    Actif,
    #[serde(rename = "Inactif")]
    Inactif,
    #[serde(rename = "Transféré")]
    Transfere,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eleve {
    pub id: String,
    #[serde(default)]
    pub matricule: String,
    #[serde(default)]
    pub nom: String,
    #[serde(default)]
    pub prenoms: String,
    #[serde(default)]
    pub sexe: String,
    pub classe_id: String,
    #[serde(default)]
    pub annee_entree: String,
    pub statut: StatutEleve,
}

/// Subject snapshot as embedded in a class. A class holds copies, not
/// references; editing the global subject list never rewrites past grading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matiere {
    pub id: String,
    #[serde(default)]
    pub nom: String,
    pub coefficient: f64,
    #[serde(default, rename = "type")]
    pub type_matiere: String,
    #[serde(default)]
    pub obligatoire: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classe {
    pub id: String,
    pub niveau: String,
    #[serde(default)]
    pub section: String,
    pub annee_scolaire: String,
    #[serde(default)]
    pub matieres: Vec<Matiere>,
}

/// Grading period shared school-wide, each with its own weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionConfig {
    pub id: String,
    #[serde(default)]
    pub nom: String,
    pub coefficient: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Echeance {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub date: String,
    pub montant: f64,
    #[serde(default)]
    pub modalite: Option<i64>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraisScolaire {
    pub id: String,
    pub niveau: String,
    pub annee_scolaire: String,
    #[serde(default)]
    pub frais_inscription: f64,
    #[serde(default)]
    pub frais_scolarite: f64,
    #[serde(default)]
    pub frais_cantine: f64,
    #[serde(default)]
    pub frais_transport: f64,
    #[serde(default)]
    pub frais_fournitures: f64,
    #[serde(default)]
    pub echeances: Vec<Echeance>,
}

/// One slice of a payment attributed to an installment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub echeance_id: String,
    pub modalite: i64,
    pub montant: f64,
}

/// Immutable once created; corrections are new payments, never edits. The
/// allocation breakdown produced at payment time is persisted with the
/// record so installment-level paid amounts survive split payments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paiement {
    pub id: String,
    pub eleve_id: String,
    pub montant: f64,
    #[serde(default)]
    pub date_paiement: String,
    #[serde(default)]
    pub type_frais: String,
    #[serde(default)]
    pub mode_paiement: String,
    #[serde(default)]
    pub numero_recu: String,
    #[serde(default)]
    pub operateur: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub modalite: Option<i64>,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub eleve_id: String,
    pub matiere_id: String,
    pub composition_id: String,
    pub valeur: f64,
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatutPaiement {
    #[serde(rename = "Payé")]
    Paye,
    #[serde(rename = "Partiellement Payé")]
    PartiellementPaye,
    #[serde(rename = "Non Payé")]
    NonPaye,
}

/// Derived snapshot, never persisted; recomputed from the fee schedule and
/// payment history on every query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SituationFinanciere {
    pub total_du: f64,
    pub total_paye: f64,
    pub solde: f64,
    pub statut: StatutPaiement,
}
