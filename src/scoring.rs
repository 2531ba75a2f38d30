use crate::model::{Classe, CompositionConfig, Eleve, Note, StatutEleve};
use crate::store::{self, Store};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::cmp::Ordering;

/// 2-decimal rounding applied to every moyenne leaving the engine:
/// `round(100*x) / 100`.
pub fn round2(x: f64) -> f64 {
    (100.0 * x).round() / 100.0
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassementLigne {
    pub eleve: Eleve,
    pub moyenne: f64,
    pub rang: usize,
}

fn notes_for_eleve(store: &Store, eleve_id: &str) -> anyhow::Result<Vec<Note>> {
    Ok(store
        .get_all_as::<Note>(store::NOTES)?
        .into_iter()
        .filter(|n| n.eleve_id == eleve_id)
        .collect())
}

/// Moyenne for one grading period: each recorded grade weighted by its
/// class-embedded subject coefficient. Subjects with no grade in the period
/// count toward neither numerator nor denominator.
pub fn composition_average(
    store: &Store,
    eleve_id: &str,
    composition_id: &str,
) -> anyhow::Result<f64> {
    let notes: Vec<Note> = notes_for_eleve(store, eleve_id)?
        .into_iter()
        .filter(|n| n.composition_id == composition_id)
        .collect();
    if notes.is_empty() {
        return Ok(0.0);
    }

    let Some(eleve) = store.get_by_id_as::<Eleve>(store::ELEVES, eleve_id)? else {
        return Ok(0.0);
    };
    let Some(classe) = store.get_by_id_as::<Classe>(store::CLASSES, &eleve.classe_id)? else {
        return Ok(0.0);
    };

    let mut total = 0.0;
    let mut total_coeff = 0.0;
    for note in &notes {
        if let Some(matiere) = classe.matieres.iter().find(|m| m.id == note.matiere_id) {
            total += note.valeur * matiere.coefficient;
            total_coeff += matiere.coefficient;
        }
    }

    if total_coeff == 0.0 {
        return Ok(0.0);
    }
    Ok(round2(total / total_coeff))
}

/// Annual moyenne: per subject, the composition-weighted average over the
/// periods that have a grade; then subjects combined by their own
/// coefficients. A subject with no grade in any period is excluded
/// entirely, never scored as zero. Grading is versioned by class — the
/// subject set and coefficients come from the student's own class record.
pub fn annual_average(store: &Store, eleve: &Eleve) -> anyhow::Result<f64> {
    let Some(classe) = store.get_by_id_as::<Classe>(store::CLASSES, &eleve.classe_id)? else {
        return Ok(0.0);
    };
    let notes = notes_for_eleve(store, &eleve.id)?;
    let compositions = store.get_all_as::<CompositionConfig>(store::COMPOSITIONS)?;

    let mut total = 0.0;
    let mut total_coeff = 0.0;
    for matiere in &classe.matieres {
        let mut somme = 0.0;
        let mut coeff_total = 0.0;
        for comp in &compositions {
            if let Some(note) = notes
                .iter()
                .find(|n| n.matiere_id == matiere.id && n.composition_id == comp.id)
            {
                somme += note.valeur * comp.coefficient;
                coeff_total += comp.coefficient;
            }
        }
        if coeff_total > 0.0 {
            // The per-subject moyenne stays unrounded until the final value.
            let moyenne_matiere = somme / coeff_total;
            total += moyenne_matiere * matiere.coefficient;
            total_coeff += matiere.coefficient;
        }
    }

    if total_coeff == 0.0 {
        return Ok(0.0);
    }
    Ok(round2(total / total_coeff))
}

/// Ordering used to rank students: descending by moyenne. Equal moyennes
/// keep their stored order and receive distinct consecutive ranks; swap
/// this comparator to change the tie policy.
fn rank_order(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Rank the active students of a class by annual moyenne, best first.
pub fn class_ranking(store: &Store, classe_id: &str) -> anyhow::Result<Vec<ClassementLigne>> {
    let eleves: Vec<Eleve> = store
        .get_all_as::<Eleve>(store::ELEVES)?
        .into_iter()
        .filter(|e| e.classe_id == classe_id && e.statut == StatutEleve::Actif)
        .collect();

    let mut avec_moyenne = Vec::with_capacity(eleves.len());
    for eleve in eleves {
        let moyenne = annual_average(store, &eleve)?;
        avec_moyenne.push((eleve, moyenne));
    }
    avec_moyenne.sort_by(|a, b| rank_order(a.1, b.1));

    Ok(avec_moyenne
        .into_iter()
        .enumerate()
        .map(|(i, (eleve, moyenne))| ClassementLigne {
            eleve,
            moyenne,
            rang: i + 1,
        })
        .collect())
}

/// Record a grade: update-if-present, create-otherwise on the
/// (eleve, matiere, composition) key. Runs inside one store transaction so
/// the triple can never be inserted twice.
pub fn upsert_note(
    store: &Store,
    eleve_id: &str,
    matiere_id: &str,
    composition_id: &str,
    valeur: f64,
) -> anyhow::Result<Value> {
    store.transaction(|s| {
        let existing = s
            .get_all_as::<Note>(store::NOTES)?
            .into_iter()
            .find(|n| {
                n.eleve_id == eleve_id
                    && n.matiere_id == matiere_id
                    && n.composition_id == composition_id
            });
        match existing {
            Some(note) => s
                .update(store::NOTES, &note.id, json!({ "valeur": valeur }))?
                .ok_or_else(|| anyhow::anyhow!("note {} vanished during upsert", note.id)),
            None => s.create(
                store::NOTES,
                json!({
                    "eleveId": eleve_id,
                    "matiereId": matiere_id,
                    "compositionId": composition_id,
                    "valeur": valeur,
                    "date": Utc::now().to_rfc3339(),
                }),
            ),
        }
    })
}
