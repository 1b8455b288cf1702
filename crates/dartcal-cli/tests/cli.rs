use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

/// Clicks for a front-on camera at 2 px/mm centered on (640, 360).
fn clicks() -> Value {
    json!({
        "imageSize": [1280, 720],
        "overlaySize": [640, 360],
        "points": [
            {"target": "d20", "image": [640.0, 20.0]},
            {"target": "d6", "image": [980.0, 360.0]},
            {"target": "d3", "image": [640.0, 700.0]},
            {"target": "d11", "image": [300.0, 360.0]},
            {"target": "bull", "image": [640.0, 360.0]}
        ]
    })
}

fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_string_pretty(value).expect("json")).expect("write");
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read")).expect("json")
}

fn dartcal() -> Command {
    Command::cargo_bin("dartcal").expect("binary")
}

#[test]
fn calibrate_writes_locked_record_and_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let points = dir.path().join("points.json");
    let out = dir.path().join("record.json");
    let history = dir.path().join("history.json");
    write_json(&points, &clicks());

    for _ in 0..2 {
        dartcal()
            .arg("calibrate")
            .arg("--points")
            .arg(&points)
            .arg("--out")
            .arg(&out)
            .arg("--history")
            .arg(&history)
            .assert()
            .success();
    }

    let record = read_json(&out);
    assert_eq!(record["locked"], json!(true));
    assert_eq!(record["imageSize"], json!([1280, 720]));
    assert!(record["errorPx"].as_f64().expect("errorPx") < 0.01);
    assert!(record["confidence"].as_f64().expect("confidence") > 99.0);
    assert_eq!(record["sectorOffset"], json!(0));
    assert_eq!(read_json(&history).as_array().map(Vec::len), Some(2));
}

#[test]
fn calibrate_prints_record_without_out() {
    let dir = tempfile::tempdir().expect("tempdir");
    let points = dir.path().join("points.json");
    write_json(&points, &clicks());

    dartcal()
        .arg("calibrate")
        .arg("--points")
        .arg(&points)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"H\"").and(predicate::str::contains("\"locked\": true")));
}

#[test]
fn calibrate_with_missing_target_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let points = dir.path().join("points.json");
    let mut input = clicks();
    input["points"].as_array_mut().expect("points").pop();
    write_json(&points, &input);

    dartcal()
        .arg("calibrate")
        .arg("--points")
        .arg(&points)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no complete fit"));
}

#[test]
fn map_reports_board_position_and_ring() {
    let dir = tempfile::tempdir().expect("tempdir");
    let points = dir.path().join("points.json");
    let record = dir.path().join("record.json");
    write_json(&points, &clicks());
    dartcal()
        .args(["calibrate", "--points"])
        .arg(&points)
        .arg("--out")
        .arg(&record)
        .assert()
        .success();

    let output = dartcal()
        .args(["map", "--record"])
        .arg(&record)
        .args(["846", "360"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let mapped: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(mapped["ring"], json!("treble"));
    let board = mapped["board"].as_array().expect("board");
    assert!((board[0].as_f64().expect("x") - 103.0).abs() < 1e-6);
    assert!(board[1].as_f64().expect("y").abs() < 1e-6);
}

#[test]
fn map_refuses_unlocked_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let record = dir.path().join("record.json");
    write_json(
        &record,
        &json!({
            "H": [[2.0, 0.0, 640.0], [0.0, 2.0, 360.0], [0.0, 0.0, 1.0]],
            "errorPx": 0.0,
            "confidence": 100.0,
            "imageSize": [1280, 720],
            "overlaySize": [640, 360],
            "theta": 0.0,
            "sectorOffset": 0,
            "createdAt": 0,
            "locked": false
        }),
    );

    dartcal()
        .args(["map", "--record"])
        .arg(&record)
        .args(["640", "360"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not locked"));

    dartcal()
        .args(["map", "--allow-unlocked", "--record"])
        .arg(&record)
        .args(["640", "360"])
        .assert()
        .success()
        .stdout(predicate::str::contains("inner_bull"));
}

#[test]
fn refine_snaps_to_edge() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("step.png");
    let img = image::GrayImage::from_fn(100, 60, |x, _| image::Luma([if x < 50 { 20 } else { 220 }]));
    img.save(&path).expect("save png");

    let output = dartcal()
        .args(["refine", "--image"])
        .arg(&path)
        .args(["46.3", "30"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let refined: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(refined, json!([49.0, 30.0]));
}
