use std::net::TcpListener;
use std::process::{Command, Output};

fn cellhue(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cellhue"))
        .args(args)
        .env_remove("CELLHUE_INPUT")
        .env_remove("CELLHUE_OUTPUT")
        .env_remove("CELLHUE_HOST")
        .env_remove("CELLHUE_PORT")
        .env_remove("RUST_LOG")
        .output()
        .expect("run cellhue")
}

/// A local port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

#[test]
fn missing_input_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("absent.xlsx");
    let output = dir.path().join("out/report.txt");

    let result = cellhue(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ]);

    assert_eq!(result.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&result.stderr).contains("input file not found"));
    assert!(!output.exists());
    assert!(!output.parent().unwrap().exists());
}

#[test]
fn unreachable_host_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Book.xlsx");
    std::fs::write(&input, b"not really a workbook").unwrap();
    let output = dir.path().join("report.txt");
    let port = closed_port().to_string();

    let result = cellhue(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--host",
        "127.0.0.1",
        "--port",
        &port,
    ]);

    assert_eq!(
        result.status.code(),
        Some(4),
        "stderr:\n{}",
        String::from_utf8_lossy(&result.stderr)
    );
    assert!(!output.exists());
}

#[test]
fn usage_errors_exit_with_two() {
    let result = cellhue(&["--palette", "red"]);
    assert_eq!(result.status.code(), Some(2));

    let result = cellhue(&["--metric", "cosine"]);
    assert_eq!(result.status.code(), Some(2));
}
