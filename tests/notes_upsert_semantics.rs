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

#[test]
fn upserting_the_same_triple_twice_updates_in_place() {
    let workspace = temp_dir("ecoled-notes-upsert");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let params = |valeur: f64| {
        json!({
            "eleveId": "el-1",
            "matiereId": "mat-math",
            "compositionId": "comp-1",
            "valeur": valeur
        })
    };
    let first = request_ok(&mut stdin, &mut reader, "2", "notes.upsert", params(11.0));
    let second = request_ok(&mut stdin, &mut reader, "3", "notes.upsert", params(14.5));

    let first_id = first
        .get("note")
        .and_then(|n| n.get("id"))
        .and_then(|v| v.as_str())
        .expect("note id");
    let second_id = second
        .get("note")
        .and_then(|n| n.get("id"))
        .and_then(|v| v.as_str())
        .expect("note id");
    assert_eq!(first_id, second_id, "update-if-present, never a second insert");

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "records.list",
        json!({ "collection": "notes" }),
    );
    let notes = listed
        .get("records")
        .and_then(|v| v.as_array())
        .expect("notes");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].get("valeur").and_then(|v| v.as_f64()), Some(14.5));

    // A different composition for the same student and subject is its own
    // record.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "notes.upsert",
        json!({
            "eleveId": "el-1",
            "matiereId": "mat-math",
            "compositionId": "comp-2",
            "valeur": 9.0
        }),
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "records.list",
        json!({ "collection": "notes" }),
    );
    assert_eq!(
        listed
            .get("records")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(2)
    );
}
