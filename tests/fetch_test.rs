#![cfg(feature = "fetch")]

use httpmock::prelude::*;
use permit_trends::adapters::http::ArchiveFetcher;
use permit_trends::EtlError;
use std::io::{Cursor, Write};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn permits_zip(content: &str) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("TF_BUILDING_PERMITS.txt", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(content.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

#[tokio::test]
async fn test_fetch_downloads_and_unpacks_archive() {
    let server = MockServer::start_async().await;
    let content = "REFNIS|CD_REFNIS_LEVEL|CD_YEAR|CD_PERIOD\n02000|2|2023|1\n";

    let archive_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/TF_BUILDING_PERMITS.zip");
            then.status(200)
                .header("Content-Type", "application/zip")
                .body(permits_zip(content));
        })
        .await;

    let data_dir = TempDir::new().unwrap();
    let fetcher = ArchiveFetcher::new(server.url("/TF_BUILDING_PERMITS.zip"));
    let path = fetcher.fetch_into(data_dir.path()).await.unwrap();

    archive_mock.assert_async().await;
    assert_eq!(path, data_dir.path().join("TF_BUILDING_PERMITS.txt"));
    assert_eq!(std::fs::read_to_string(path).unwrap(), content);
}

#[tokio::test]
async fn test_fetch_not_found_is_network_error() {
    let server = MockServer::start_async().await;

    let archive_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/missing.zip");
            then.status(404);
        })
        .await;

    let data_dir = TempDir::new().unwrap();
    let fetcher = ArchiveFetcher::new(server.url("/missing.zip"));
    let err = fetcher.fetch_into(data_dir.path()).await.unwrap_err();

    archive_mock.assert_async().await;
    assert!(matches!(err, EtlError::FetchError(_)));
    assert_eq!(err.severity().exit_code(), 2);
    assert!(std::fs::read_dir(data_dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_downloaded_non_archive_is_rejected() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/page.zip");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let data_dir = TempDir::new().unwrap();
    let fetcher = ArchiveFetcher::new(server.url("/page.zip"));
    let err = fetcher.fetch_into(data_dir.path()).await.unwrap_err();

    assert!(matches!(err, EtlError::ArchiveError(_)));
}
