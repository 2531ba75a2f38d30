use crate::model::{
    Allocation, Classe, Echeance, Eleve, FraisScolaire, Paiement, SituationFinanciere,
    StatutPaiement,
};
use crate::store::{self, Store};
use chrono::Utc;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// One installment of a student's fee schedule, with the amounts already
/// paid against it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleLine {
    pub echeance_id: String,
    pub modalite: i64,
    pub label: String,
    pub date: String,
    pub montant: f64,
    pub paid: f64,
    pub remaining: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub paiement: Value,
    pub allocations: Vec<Allocation>,
    pub remaining_amount: f64,
}

/// Installment targeting for a payment: auto-resolve against the first
/// affected installment, or pin an explicit modalite.
#[derive(Debug, Clone, Copy, Default)]
pub enum ModaliteChoice {
    #[default]
    Auto,
    Fixe(i64),
}

impl<'de> Deserialize<'de> for ModaliteChoice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(ModaliteChoice::Auto),
            Value::String(s) if s == "auto" => Ok(ModaliteChoice::Auto),
            Value::Number(n) => n
                .as_i64()
                .map(ModaliteChoice::Fixe)
                .ok_or_else(|| de::Error::custom("modalite must be an integer")),
            _ => Err(de::Error::custom("modalite must be an integer or \"auto\"")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentMetadata {
    pub type_frais: Option<String>,
    pub mode_paiement: Option<String>,
    pub numero_recu: Option<String>,
    pub operateur: Option<String>,
    pub note: Option<String>,
    pub modalite: ModaliteChoice,
}

fn frais_for_classe(store: &Store, classe: &Classe) -> anyhow::Result<Option<FraisScolaire>> {
    // Exact (niveau, annéeScolaire) match, first wins; no fallback to a
    // prior year's schedule.
    Ok(store
        .get_all_as::<FraisScolaire>(store::FRAIS_SCOLAIRES)?
        .into_iter()
        .find(|f| f.niveau == classe.niveau && f.annee_scolaire == classe.annee_scolaire))
}

/// Sum already paid against one installment. Payments carrying an
/// allocation breakdown are attributed slice by slice; breakdown-less
/// records (hand-entered or imported) count their full montant against
/// their recorded modalite.
fn paid_against(paiements: &[Paiement], modalite: i64) -> f64 {
    let mut paid = 0.0;
    for p in paiements {
        if p.allocations.is_empty() {
            if p.modalite == Some(modalite) {
                paid += p.montant;
            }
        } else {
            paid += p
                .allocations
                .iter()
                .filter(|a| a.modalite == modalite)
                .map(|a| a.montant)
                .sum::<f64>();
        }
    }
    paid
}

fn schedule_line(
    frais: &FraisScolaire,
    echeance: &Echeance,
    paiements: &[Paiement],
) -> ScheduleLine {
    let modalite = echeance.modalite.unwrap_or(1);
    let paid = paid_against(paiements, modalite);
    ScheduleLine {
        echeance_id: echeance.id.clone().unwrap_or_else(|| {
            format!("{}-{}-{}", frais.niveau, frais.annee_scolaire, modalite)
        }),
        modalite,
        label: echeance
            .label
            .clone()
            .unwrap_or_else(|| format!("Modalité {}", modalite)),
        date: echeance.date.clone(),
        montant: echeance.montant,
        paid,
        remaining: (echeance.montant - paid).max(0.0),
    }
}

/// Resolve a student's fee schedule into installment lines. A missing
/// student, class or schedule is a normal "nothing owed yet" state and
/// yields an empty list.
pub fn compute_schedule(store: &Store, eleve_id: &str) -> anyhow::Result<Vec<ScheduleLine>> {
    let Some(eleve) = store.get_by_id_as::<Eleve>(store::ELEVES, eleve_id)? else {
        return Ok(Vec::new());
    };
    let Some(classe) = store.get_by_id_as::<Classe>(store::CLASSES, &eleve.classe_id)? else {
        return Ok(Vec::new());
    };
    let Some(frais) = frais_for_classe(store, &classe)? else {
        return Ok(Vec::new());
    };

    let paiements: Vec<Paiement> = store
        .get_all_as::<Paiement>(store::PAIEMENTS)?
        .into_iter()
        .filter(|p| p.eleve_id == eleve_id)
        .collect();

    Ok(frais
        .echeances
        .iter()
        .map(|e| schedule_line(&frais, e, &paiements))
        .collect())
}

fn default_numero_recu() -> String {
    format!("REC{:08}", Utc::now().timestamp_millis() % 100_000_000)
}

/// Distribute `montant` over the outstanding installments and persist the
/// payment. Installments are walked in stored order — declaration order is
/// the allocation contract, not due-date order. Over-payment is reported
/// back as `remaining_amount`, never carried to a future schedule.
pub fn process_payment(
    store: &Store,
    eleve_id: &str,
    montant: f64,
    date_paiement: &str,
    metadata: &PaymentMetadata,
) -> anyhow::Result<PaymentResult> {
    let schedule = compute_schedule(store, eleve_id)?;

    let mut allocations: Vec<Allocation> = Vec::new();
    let mut remaining_amount = montant;
    for line in &schedule {
        if remaining_amount <= 0.0 || line.remaining <= 0.0 {
            continue;
        }
        let alloue = remaining_amount.min(line.remaining);
        allocations.push(Allocation {
            echeance_id: line.echeance_id.clone(),
            modalite: line.modalite,
            montant: alloue,
        });
        remaining_amount -= alloue;
    }

    let modalite = match metadata.modalite {
        ModaliteChoice::Fixe(m) => m,
        ModaliteChoice::Auto => allocations.first().map(|a| a.modalite).unwrap_or(1),
    };

    let paiement = store.create(
        store::PAIEMENTS,
        json!({
            "eleveId": eleve_id,
            "montant": montant,
            "datePaiement": date_paiement,
            "typeFrais": metadata.type_frais.clone().unwrap_or_else(|| "scolarite".to_string()),
            "modePaiement": metadata.mode_paiement.clone().unwrap_or_else(|| "espece".to_string()),
            "numeroRecu": metadata.numero_recu.clone().unwrap_or_else(default_numero_recu),
            "operateur": metadata.operateur.clone().unwrap_or_else(|| "ADMIN".to_string()),
            "note": metadata.note.clone().unwrap_or_default(),
            "modalite": modalite,
            "allocations": &allocations,
        }),
    )?;

    tracing::debug!(
        eleve = %eleve_id,
        montant,
        allocations = allocations.len(),
        remainder = remaining_amount,
        "paiement alloué"
    );

    Ok(PaymentResult {
        paiement,
        allocations,
        remaining_amount,
    })
}

/// Aggregate a student's amounts due and paid into the tri-state statut.
/// Missing student/class/schedule degrades to the all-zero situation.
pub fn situation_financiere(
    store: &Store,
    eleve_id: &str,
) -> anyhow::Result<SituationFinanciere> {
    let frais = match store.get_by_id_as::<Eleve>(store::ELEVES, eleve_id)? {
        Some(eleve) => match store.get_by_id_as::<Classe>(store::CLASSES, &eleve.classe_id)? {
            Some(classe) => frais_for_classe(store, &classe)?,
            None => None,
        },
        None => None,
    };

    let total_du = frais
        .map(|f| {
            f.frais_inscription
                + f.frais_scolarite
                + f.frais_cantine
                + f.frais_transport
                + f.frais_fournitures
        })
        .unwrap_or(0.0);

    let total_paye: f64 = store
        .get_all_as::<Paiement>(store::PAIEMENTS)?
        .iter()
        .filter(|p| p.eleve_id == eleve_id)
        .map(|p| p.montant)
        .sum();

    let solde = total_du - total_paye;

    // Deliberate asymmetry: zero due with zero paid reads as Non Payé, not
    // as a distinct "nothing owed" state.
    let statut = if solde <= 0.0 && total_du > 0.0 {
        StatutPaiement::Paye
    } else if total_paye > 0.0 && solde > 0.0 {
        StatutPaiement::PartiellementPaye
    } else {
        StatutPaiement::NonPaye
    };

    Ok(SituationFinanciere {
        total_du,
        total_paye,
        solde,
        statut,
    })
}
