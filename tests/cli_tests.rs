use std::fs;
use std::io::Read;
use std::process::Command;

use flate2::read::GzDecoder;

#[test]
fn writes_a_decodable_bomb() {
    let exe = env!("CARGO_BIN_EXE_layerbomb");
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("bomb.gz");

    let status = Command::new(exe)
        .args(["-e", "gzip", "-s", "100000", "-o"])
        .arg(&output)
        .args(["text:<p>", "fill:0x20", "text:</p>"])
        .status()
        .expect("layerbomb failed to start");
    assert!(status.success());

    let bytes = fs::read(&output).unwrap();
    let mut decoded = Vec::new();
    GzDecoder::new(&bytes[..]).read_to_end(&mut decoded).unwrap();
    assert_eq!(decoded.len(), 100_007);
    assert!(decoded.starts_with(b"<p>  "));
    assert!(decoded.ends_with(b"  </p>"));
}

#[test]
fn file_directive_and_stdout() {
    let exe = env!("CARGO_BIN_EXE_layerbomb");
    let dir = tempfile::tempdir().unwrap();
    let head = dir.path().join("head.txt");
    fs::write(&head, b"HEAD").unwrap();

    let out = Command::new(exe)
        .args(["-e", "gzip, gzip", "-s", "1e6"])
        .arg(format!("file:{}", head.display()))
        .arg("fill:a")
        .output()
        .expect("layerbomb failed to start");
    assert!(out.status.success());

    let mut decoded = Vec::new();
    GzDecoder::new(GzDecoder::new(&out.stdout[..]))
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded.len(), 1_000_004);
    assert_eq!(&decoded[..5], b"HEADa");
}

#[test]
fn json_report_lists_layers() {
    let exe = env!("CARGO_BIN_EXE_layerbomb");
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("bomb.bin");

    let out = Command::new(exe)
        .args(["-e", "deflate,gzip", "-s", "10^12", "--json", "-o"])
        .arg(&output)
        .arg("fill:0")
        .output()
        .expect("layerbomb failed to start");
    assert!(out.status.success());

    let report: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(report["decoded_bytes"], "1000000000000");
    let layers = report["layers"].as_array().unwrap();
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[0]["codec"], "deflate");
    assert_eq!(layers[1]["codec"], "gzip");
    assert_eq!(
        report["emitted_bytes"].as_u64().unwrap(),
        fs::metadata(&output).unwrap().len()
    );
}

#[test]
fn unsupported_codec_fails_with_hint() {
    let exe = env!("CARGO_BIN_EXE_layerbomb");
    let out = Command::new(exe)
        .args(["-e", "gzip,br", "fill:a"])
        .output()
        .expect("layerbomb failed to start");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("'br' is not supported"), "{stderr}");
}

#[test]
fn oversized_output_is_refused() {
    let exe = env!("CARGO_BIN_EXE_layerbomb");
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("never.gz");
    let out = Command::new(exe)
        .args(["-e", "gzip", "-s", "1e30", "-o"])
        .arg(&output)
        .arg("fill:a")
        .output()
        .expect("layerbomb failed to start");
    assert!(!out.status.success());
    assert!(!output.exists());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Add more layers"));
}
