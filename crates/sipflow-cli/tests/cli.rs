use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use etherparse::PacketBuilder;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("sipflow"))
}

fn sip(first_line: &str, call_id: &str, cseq: &str, from_user: &str) -> Vec<u8> {
    format!(
        "{first_line}\r\n\
Call-ID: {call_id}\r\n\
From: <sip:{from_user}@example.com>;tag=f1\r\n\
To: <sip:bob@example.com>\r\n\
CSeq: {cseq}\r\n\
Content-Length: 0\r\n\r\n"
    )
    .into_bytes()
}

fn udp_frame(payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2])
        .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
        .udp(5060, 5060);
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, payload).expect("frame");
    frame
}

fn block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let total_len = (8 + body.len() + 4) as u32;
    let mut out = Vec::with_capacity(total_len as usize);
    out.extend_from_slice(&block_type.to_be_bytes());
    out.extend_from_slice(&total_len.to_be_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(&total_len.to_be_bytes());
    out
}

fn write_capture(path: &Path, payloads: &[Vec<u8>]) {
    let mut shb = 0x1A2B3C4Du32.to_be_bytes().to_vec();
    shb.extend_from_slice(&[0, 1, 0, 0]);
    shb.extend_from_slice(&(-1i64).to_be_bytes());
    let mut idb = 1u16.to_be_bytes().to_vec();
    idb.extend_from_slice(&[0, 0]);
    idb.extend_from_slice(&65535u32.to_be_bytes());

    let mut out = block(0x0A0D0D0A, &shb);
    out.extend_from_slice(&block(1, &idb));
    for (i, payload) in payloads.iter().enumerate() {
        let data = udp_frame(payload);
        let ts_us = (i as u64 + 1) * 1_000_000;
        let mut epb = Vec::new();
        epb.extend_from_slice(&0u32.to_be_bytes());
        epb.extend_from_slice(&((ts_us >> 32) as u32).to_be_bytes());
        epb.extend_from_slice(&(ts_us as u32).to_be_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_be_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_be_bytes());
        epb.extend_from_slice(&data);
        epb.resize(epb.len() + (4 - data.len() % 4) % 4, 0);
        out.extend_from_slice(&block(6, &epb));
    }
    fs::write(path, out).expect("write capture");
}

/// An INVITE dialog, a REGISTER and a second INVITE with two messages.
fn sample_capture(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("sample.pcapng");
    write_capture(
        &path,
        &[
            sip("INVITE sip:bob@example.com SIP/2.0", "call-1", "1 INVITE", "alice"),
            sip("REGISTER sip:example.com SIP/2.0", "reg-1", "1 REGISTER", "carol"),
            sip("INVITE sip:bob@example.com SIP/2.0", "call-2", "1 INVITE", "dave"),
            sip("SIP/2.0 180 Ringing", "call-2", "1 INVITE", "dave"),
        ],
    );
    path
}

fn run_stdout(args: &[&str], input: &Path) -> Value {
    let assert = cmd()
        .arg("pcap")
        .arg("calls")
        .arg(input)
        .arg("--stdout")
        .args(args)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    serde_json::from_str(&stdout).expect("valid json")
}

#[test]
fn help_supports_calls_and_dialogs() {
    cmd().args(["pcap", "calls", "--help"]).assert().success();
    cmd().args(["pcap", "dialogs", "--help"]).assert().success();
}

#[test]
fn version_prints_binary_name() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("sipflow"));
}

#[test]
fn missing_input_shows_error_and_hint() {
    let temp = TempDir::new().expect("tempdir");
    let missing = temp.path().join("missing.pcapng");
    let report = temp.path().join("report.json");

    cmd()
        .arg("pcap")
        .arg("calls")
        .arg(missing)
        .arg("-o")
        .arg(report)
        .assert()
        .failure()
        .code(2)
        .stderr(contains("error:").and(contains("hint:")));
}

#[test]
fn unsupported_extension_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let input = temp.path().join("capture.txt");
    fs::write(&input, b"not a capture").expect("write");

    cmd()
        .arg("pcap")
        .arg("calls")
        .arg(input)
        .arg("--stdout")
        .assert()
        .failure()
        .stderr(contains("unsupported input format"));
}

#[test]
fn stdout_outputs_call_report() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let json = run_stdout(&[], &input);

    assert_eq!(json["report_version"], 1);
    assert_eq!(json["tool"]["name"], "sipflow");
    assert_eq!(json["stats"]["total"], 3);
    assert_eq!(json["capture_summary"]["packets_total"], 4);
    let calls = json["calls"].as_array().expect("calls");
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0]["call_id"], "call-1");
    assert_eq!(calls[0]["state"], "CALL SETUP");
    assert_eq!(calls[2]["messages"].as_array().map(Vec::len), Some(2));
}

#[test]
fn invite_only_and_sorting() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let json = run_stdout(&["--calls", "--sort-by", "msgcnt", "--desc"], &input);

    let ids: Vec<&str> = json["calls"]
        .as_array()
        .expect("calls")
        .iter()
        .filter_map(|c| c["call_id"].as_str())
        .collect();
    assert_eq!(ids, ["call-2", "call-1"]);
    assert_eq!(json["capture_summary"]["rejected_messages"], 1);
}

#[test]
fn view_filters_narrow_the_report() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let json = run_stdout(&["--filter", "from=dave", "--no-messages"], &input);

    assert_eq!(json["stats"]["total"], 3);
    assert_eq!(json["stats"]["displayed"], 1);
    assert_eq!(json["calls"][0]["call_id"], "call-2");
    assert!(json["calls"][0].get("messages").is_none());
}

#[test]
fn unknown_filter_kind_has_hint() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);

    cmd()
        .arg("pcap")
        .arg("calls")
        .arg(input)
        .arg("--stdout")
        .arg("--filter")
        .arg("color=red")
        .assert()
        .failure()
        .stderr(contains("error:").and(contains("hint: use KIND=EXPR")));
}

#[test]
fn config_file_supplies_outfile_and_match() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let report = temp.path().join("out").join("calls.json");
    let config = temp.path().join("sipflow.json");
    let body = serde_json::json!({
        "match": { "expression": "^REGISTER" },
        "capture": { "outfile": report },
    });
    fs::write(&config, body.to_string()).expect("config");

    cmd()
        .arg("pcap")
        .arg("calls")
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stderr(contains("OK: report written"));

    let json: Value =
        serde_json::from_str(&fs::read_to_string(&report).expect("report")).expect("json");
    assert_eq!(json["stats"]["total"], 1);
    assert_eq!(json["calls"][0]["call_id"], "reg-1");
}

#[test]
fn missing_output_path_is_reported() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);

    cmd()
        .arg("pcap")
        .arg("calls")
        .arg(input)
        .assert()
        .failure()
        .stderr(contains("missing output path"));
}

#[test]
fn stdout_and_report_conflict() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let report = temp.path().join("report.json");

    cmd()
        .arg("pcap")
        .arg("calls")
        .arg(input)
        .arg("--stdout")
        .arg("-o")
        .arg(report)
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn pretty_and_compact_conflict() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);

    cmd()
        .arg("pcap")
        .arg("calls")
        .arg(input)
        .arg("--stdout")
        .arg("--pretty")
        .arg("--compact")
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn quiet_suppresses_ok_message() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let report = temp.path().join("report.json");

    cmd()
        .arg("pcap")
        .arg("calls")
        .arg(input)
        .arg("-o")
        .arg(&report)
        .arg("--quiet")
        .assert()
        .success()
        .stderr(contains("OK:").not());
    assert!(report.exists());
}

#[test]
fn glob_input_resolves_single_match() {
    let temp = TempDir::new().expect("tempdir");
    sample_capture(&temp);
    let pattern = temp.path().join("sam*.pcapng");

    let json = run_stdout(&[], &pattern);
    assert_eq!(json["stats"]["total"], 3);
}

#[test]
fn list_calls_prints_rows() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);

    cmd()
        .arg("pcap")
        .arg("calls")
        .arg(input)
        .arg("--stdout")
        .arg("--list-calls")
        .assert()
        .success()
        .stderr(contains("Calls: 3 shown of 3").and(contains("REGISTER")));
}

#[test]
fn strict_fails_when_nothing_matches() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);

    cmd()
        .arg("pcap")
        .arg("calls")
        .arg(input)
        .arg("--stdout")
        .arg("--filter")
        .arg("method=^OPTIONS$")
        .arg("--strict")
        .assert()
        .failure()
        .code(2)
        .stderr(contains("no calls matched"));
}

#[test]
fn invalid_filter_expression_is_reported_before_loading() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);

    cmd()
        .arg("pcap")
        .arg("calls")
        .arg(input)
        .arg("--stdout")
        .arg("--filter")
        .arg("method=(unclosed")
        .assert()
        .failure()
        .code(2)
        .stdout(predicates::str::is_empty())
        .stderr(
            contains("error: invalid method filter")
                .and(contains("hint: fix the regular expression in --filter method=(unclosed"))
                .and(contains("loading failed").not()),
        );
}

#[test]
fn invalid_match_expression_has_hint() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);

    cmd()
        .arg("pcap")
        .arg("calls")
        .arg(input)
        .arg("--stdout")
        .arg("--match")
        .arg("[oops")
        .assert()
        .failure()
        .stderr(contains("error: invalid match expression").and(contains("hint: fix")));
}
