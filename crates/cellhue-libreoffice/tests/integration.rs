//! Integration tests against a live LibreOffice.
//!
//! These tests require a running LibreOffice instance with a URP socket listener:
//!
//!    soffice --headless --accept="socket,host=localhost,port=2002;urp;StarOffice.ComponentContext"
//!
//! If LibreOffice is not reachable on localhost:2002, all tests are skipped.

use cellhue_core::{walk_sheet, ExtractOptions, SheetSource};
use cellhue_libreoffice::{BridgeError, LibreOfficeBridge};

/// Check if a LibreOffice URP listener is available on localhost:2002.
fn urp_available() -> bool {
    std::net::TcpStream::connect_timeout(
        &"127.0.0.1:2002".parse().unwrap(),
        std::time::Duration::from_secs(2),
    )
    .is_ok()
}

/// Skip this test if URP is not available.
macro_rules! skip_if_no_urp {
    () => {
        if !urp_available() {
            eprintln!(
                "SKIP: LibreOffice URP not available on localhost:2002.\n\
                 Start LibreOffice with:\n  \
                 soffice --headless --accept=\"socket,host=localhost,port=2002;urp;StarOffice.ComponentContext\""
            );
            return;
        }
    };
}

#[tokio::test]
async fn test_connect_and_bootstrap() {
    skip_if_no_urp!();

    let bridge = LibreOfficeBridge::connect("localhost", 2002)
        .await
        .expect("connect");
    assert!(!bridge.owns_process());
    bridge.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn test_blank_workbook_walks_to_nothing() {
    skip_if_no_urp!();

    let mut bridge = LibreOfficeBridge::connect("localhost", 2002)
        .await
        .expect("connect");
    let mut wb = bridge.new_workbook().await.expect("new_workbook");
    assert!(wb.sheet_count().await.expect("sheet_count") >= 1);

    {
        let mut sheet = wb.sheet(0).await.expect("sheet 0");
        assert!(!sheet.sheet_name().await.expect("name").is_empty());

        let range = sheet.used_range().await.expect("used_range");
        assert_eq!(range.map(|r| r.to_string()), Some("A1".to_string()));

        let cells = walk_sheet(&mut sheet, &ExtractOptions::default())
            .await
            .expect("walk");
        assert!(cells.is_empty());
    }

    let count = wb.sheet_count().await.expect("sheet_count");
    match wb.sheet(count).await {
        Err(BridgeError::NoSuchSheet { index, .. }) => assert_eq!(index, count),
        Err(other) => panic!("expected NoSuchSheet, got {other}"),
        Ok(_) => panic!("sheet {count} should not exist"),
    }

    wb.close().await.expect("close");
    bridge.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn test_missing_file_fails_to_open() {
    skip_if_no_urp!();

    let dir = tempfile::tempdir().unwrap();
    let mut bridge = LibreOfficeBridge::connect("localhost", 2002)
        .await
        .expect("connect");
    match bridge.open_workbook(&dir.path().join("absent.xlsx")).await {
        Err(BridgeError::WorkbookOpen { url, .. }) => assert!(url.starts_with("file://")),
        Err(other) => panic!("expected WorkbookOpen, got {other}"),
        Ok(_) => panic!("opened a file that does not exist"),
    }
    bridge.shutdown().await.expect("shutdown");
}
