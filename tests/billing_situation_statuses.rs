use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_ecoled");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn ecoled");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn create_record(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    collection: &str,
    fields: serde_json::Value,
) -> String {
    let result = request_ok(
        stdin,
        reader,
        id,
        "records.create",
        json!({ "collection": collection, "fields": fields }),
    );
    result
        .get("record")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .expect("record id")
        .to_string()
}

fn situation(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    eleve_id: &str,
) -> (f64, f64, f64, String) {
    let s = request_ok(
        stdin,
        reader,
        id,
        "billing.situation",
        json!({ "eleveId": eleve_id }),
    );
    (
        s.get("totalDu").and_then(|v| v.as_f64()).expect("totalDu"),
        s.get("totalPaye").and_then(|v| v.as_f64()).expect("totalPaye"),
        s.get("solde").and_then(|v| v.as_f64()).expect("solde"),
        s.get("statut").and_then(|v| v.as_str()).expect("statut").to_string(),
    )
}

#[test]
fn statut_walks_the_full_truth_table() {
    let workspace = temp_dir("ecoled-statut-table");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let classe_id = create_record(
        &mut stdin,
        &mut reader,
        "2",
        "classes",
        json!({ "niveau": "CM2", "section": "A", "anneeScolaire": "2024-2025", "matieres": [] }),
    );
    let eleve_id = create_record(
        &mut stdin,
        &mut reader,
        "3",
        "eleves",
        json!({ "nom": "Koné", "prenoms": "Awa", "classeId": classe_id, "statut": "Actif" }),
    );

    // No fee schedule yet: the degenerate zero-due state reads Non Payé.
    let (du, paye, solde, statut) = situation(&mut stdin, &mut reader, "4", &eleve_id);
    assert_eq!((du, paye, solde), (0.0, 0.0, 0.0));
    assert_eq!(statut, "Non Payé");

    let _ = create_record(
        &mut stdin,
        &mut reader,
        "5",
        "fraisScolaires",
        json!({
            "niveau": "CM2",
            "anneeScolaire": "2024-2025",
            "fraisInscription": 10000.0,
            "fraisScolarite": 50000.0,
            "fraisCantine": 15000.0,
            "fraisTransport": 0.0,
            "fraisFournitures": 5000.0,
            "echeances": [
                { "date": "2024-10-15", "montant": 50000.0, "modalite": 1 },
                { "date": "2025-01-15", "montant": 30000.0, "modalite": 2 }
            ]
        }),
    );

    let (du, _, _, statut) = situation(&mut stdin, &mut reader, "6", &eleve_id);
    assert_eq!(du, 80000.0, "totalDu sums the five fee components");
    assert_eq!(statut, "Non Payé");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "billing.pay",
        json!({ "eleveId": eleve_id, "montant": 30000.0, "datePaiement": "2024-10-01" }),
    );
    let (_, paye, solde, statut) = situation(&mut stdin, &mut reader, "8", &eleve_id);
    assert_eq!(paye, 30000.0);
    assert_eq!(solde, 50000.0);
    assert_eq!(statut, "Partiellement Payé");

    // Settle the balance exactly: solde 0 counts as paid.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "billing.pay",
        json!({ "eleveId": eleve_id, "montant": 50000.0, "datePaiement": "2024-11-01" }),
    );
    let (_, _, solde, statut) = situation(&mut stdin, &mut reader, "10", &eleve_id);
    assert_eq!(solde, 0.0);
    assert_eq!(statut, "Payé");

    // Overpaying keeps the statut at Payé with a negative solde.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "billing.pay",
        json!({ "eleveId": eleve_id, "montant": 10000.0, "datePaiement": "2024-12-01" }),
    );
    let (_, paye, solde, statut) = situation(&mut stdin, &mut reader, "12", &eleve_id);
    assert_eq!(paye, 90000.0);
    assert_eq!(solde, -10000.0);
    assert_eq!(statut, "Payé");
}

#[test]
fn unknown_student_degrades_to_the_all_zero_situation() {
    let workspace = temp_dir("ecoled-statut-missing");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (du, paye, solde, statut) = situation(&mut stdin, &mut reader, "2", "missing");
    assert_eq!((du, paye, solde), (0.0, 0.0, 0.0));
    assert_eq!(statut, "Non Payé");
}
