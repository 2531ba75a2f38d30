use crate::billing::{self, PaymentMetadata};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn eleve_id_param(req: &Request) -> Result<String, serde_json::Value> {
    match req.params.get("eleveId").and_then(|v| v.as_str()) {
        Some(id) => Ok(id.to_string()),
        None => Err(err(&req.id, "bad_params", "missing eleveId", None)),
    }
}

fn handle_billing_schedule(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let eleve_id = match eleve_id_param(req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match billing::compute_schedule(store, &eleve_id) {
        Ok(schedule) => ok(&req.id, json!({ "schedule": schedule })),
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}

fn handle_billing_pay(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let eleve_id = match eleve_id_param(req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Some(montant) = req.params.get("montant").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "missing montant", None);
    };
    if montant <= 0.0 {
        return err(&req.id, "bad_params", "montant must be positive", None);
    }
    let Some(date_paiement) = req.params.get("datePaiement").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing datePaiement", None);
    };

    let metadata = match req.params.get("metadata") {
        None => PaymentMetadata::default(),
        Some(raw) if raw.is_null() => PaymentMetadata::default(),
        Some(raw) => match serde_json::from_value::<PaymentMetadata>(raw.clone()) {
            Ok(m) => m,
            Err(e) => return err(&req.id, "bad_params", format!("bad metadata: {}", e), None),
        },
    };

    match billing::process_payment(store, &eleve_id, montant, date_paiement, &metadata) {
        Ok(result) => ok(
            &req.id,
            json!({
                "paiement": result.paiement,
                "allocations": result.allocations,
                "remainder": result.remaining_amount,
            }),
        ),
        Err(e) => err(&req.id, "store_write_failed", e.to_string(), None),
    }
}

fn handle_billing_situation(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let eleve_id = match eleve_id_param(req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match billing::situation_financiere(store, &eleve_id) {
        Ok(situation) => match serde_json::to_value(&situation) {
            Ok(v) => ok(&req.id, v),
            Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
        },
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "billing.schedule" => Some(handle_billing_schedule(state, req)),
        "billing.pay" => Some(handle_billing_pay(state, req)),
        "billing.situation" => Some(handle_billing_situation(state, req)),
        _ => None,
    }
}
