use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::Eleve;
use crate::scoring;
use crate::store;
use serde_json::json;

fn str_param(req: &Request, name: &str) -> Result<String, serde_json::Value> {
    match req.params.get(name).and_then(|v| v.as_str()) {
        Some(v) => Ok(v.to_string()),
        None => Err(err(
            &req.id,
            "bad_params",
            format!("missing {}", name),
            None,
        )),
    }
}

fn handle_composition_average(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let eleve_id = match str_param(req, "eleveId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let composition_id = match str_param(req, "compositionId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match scoring::composition_average(store, &eleve_id, &composition_id) {
        Ok(moyenne) => ok(&req.id, json!({ "moyenne": moyenne })),
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}

fn handle_annual_average(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let eleve_id = match str_param(req, "eleveId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let eleve = match store.get_by_id_as::<Eleve>(store::ELEVES, &eleve_id) {
        Ok(Some(e)) => e,
        // An unknown student has no grades; average is zero, not an error.
        Ok(None) => return ok(&req.id, json!({ "moyenne": 0.0 })),
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    match scoring::annual_average(store, &eleve) {
        Ok(moyenne) => ok(&req.id, json!({ "moyenne": moyenne })),
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}

fn handle_ranking(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let classe_id = match str_param(req, "classeId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match scoring::class_ranking(store, &classe_id) {
        Ok(ranking) => ok(&req.id, json!({ "ranking": ranking })),
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}

fn handle_notes_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let eleve_id = match str_param(req, "eleveId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let matiere_id = match str_param(req, "matiereId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let composition_id = match str_param(req, "compositionId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(valeur) = req.params.get("valeur").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "missing valeur", None);
    };

    match scoring::upsert_note(store, &eleve_id, &matiere_id, &composition_id, valeur) {
        Ok(note) => ok(&req.id, json!({ "note": note })),
        Err(e) => err(&req.id, "store_write_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scoring.compositionAverage" => Some(handle_composition_average(state, req)),
        "scoring.annualAverage" => Some(handle_annual_average(state, req)),
        "scoring.ranking" => Some(handle_ranking(state, req)),
        "notes.upsert" => Some(handle_notes_upsert(state, req)),
        _ => None,
    }
}
