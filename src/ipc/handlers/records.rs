use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;

/// Generic CRUD over the known collections. Everything here is plain field
/// plumbing; the engines live in `billing` and `scoring`.

fn collection_param(req: &Request) -> Result<String, serde_json::Value> {
    let Some(name) = req.params.get("collection").and_then(|v| v.as_str()) else {
        return Err(err(&req.id, "bad_params", "missing collection", None));
    };
    if !store::is_known_collection(name) {
        return Err(err(
            &req.id,
            "bad_params",
            format!("unknown collection: {}", name),
            Some(json!({ "collection": name })),
        ));
    }
    Ok(name.to_string())
}

fn handle_records_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let collection = match collection_param(req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match store.get_all(&collection) {
        Ok(records) => ok(&req.id, json!({ "records": records })),
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}

fn handle_records_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let collection = match collection_param(req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let Some(fields) = req.params.get("fields") else {
        return err(&req.id, "bad_params", "missing fields", None);
    };
    if !fields.is_object() {
        return err(&req.id, "bad_params", "fields must be an object", None);
    }
    match store.create(&collection, fields.clone()) {
        Ok(record) => ok(&req.id, json!({ "record": record })),
        Err(e) => err(&req.id, "store_write_failed", e.to_string(), None),
    }
}

fn handle_records_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let collection = match collection_param(req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let Some(id) = req.params.get("id").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing id", None);
    };
    let Some(patch) = req.params.get("patch") else {
        return err(&req.id, "bad_params", "missing patch", None);
    };
    if !patch.is_object() {
        return err(&req.id, "bad_params", "patch must be an object", None);
    }
    match store.update(&collection, id, patch.clone()) {
        Ok(Some(record)) => ok(&req.id, json!({ "record": record })),
        Ok(None) => err(&req.id, "not_found", "record not found", None),
        Err(e) => err(&req.id, "store_write_failed", e.to_string(), None),
    }
}

fn handle_records_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let collection = match collection_param(req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let Some(id) = req.params.get("id").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing id", None);
    };
    match store.delete(&collection, id) {
        Ok(deleted) => ok(&req.id, json!({ "deleted": deleted })),
        Err(e) => err(&req.id, "store_write_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.list" => Some(handle_records_list(state, req)),
        "records.create" => Some(handle_records_create(state, req)),
        "records.update" => Some(handle_records_update(state, req)),
        "records.delete" => Some(handle_records_delete(state, req)),
        _ => None,
    }
}
