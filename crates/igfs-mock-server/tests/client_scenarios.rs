// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Protocol client against the in-process server

use igfs_client::{ClientConfig, ClientError, ConnectionState, Connector, IgfsClient};
use igfs_mock_server::{
    MockConnector, MockIgfsServer, MockTransport, ERR_DIRECTORY_NOT_EMPTY, ERR_UNKNOWN_FILE_SYSTEM,
};
use igfs_proto::{Command, IgfsRequest, RES_TYPE_ERR_STREAM_ID};

fn config() -> ClientConfig {
    ClientConfig::builder("localhost", 10500)
        .user_name("tester")
        .build()
        .unwrap()
}

fn client(server: &MockIgfsServer) -> IgfsClient<MockTransport> {
    let mut client = MockConnector::new(server.clone(), config()).connect().unwrap();
    assert!(client.handshake().unwrap().is_ok());
    client
}

#[igfs_test_utils::logged_test]
fn handshake_reports_server_block_size() {
    let server = MockIgfsServer::with_block_size("myFileSystem", 4096);
    let mut client = MockConnector::new(server.clone(), config()).connect().unwrap();

    let handshake = client.handshake().unwrap().into_payload().flatten().unwrap();
    assert_eq!(handshake.fs_name, "myFileSystem");
    assert_eq!(handshake.block_size, 4096);
    assert_eq!(handshake.sampling, None);
    assert_eq!(server.connections(), 1);
}

#[igfs_test_utils::logged_test]
fn handshake_with_unknown_file_system_is_a_server_error() {
    let server = MockIgfsServer::new("other");
    let mut client = MockConnector::new(server, config()).connect().unwrap();

    let response = client.handshake().unwrap();
    assert!(!response.is_ok());
    assert_eq!(response.error_code(), ERR_UNKNOWN_FILE_SYSTEM);
    assert_eq!(client.state(), ConnectionState::Idle);
}

#[igfs_test_utils::logged_test]
fn create_write_close_then_read_back() {
    let server = MockIgfsServer::default();
    let mut client = client(&server);

    let created = client.open_create("/dir/hello.txt").unwrap();
    let stream_id = created.payload().unwrap().stream_id;
    client.write_block(stream_id, b"hello").unwrap();
    assert!(client.close(stream_id).unwrap().payload().unwrap().successful);
    assert_eq!(server.file("/dir/hello.txt").unwrap(), b"hello");

    let opened = client.open_read("/dir/hello.txt").unwrap().into_payload().flatten().unwrap();
    assert_eq!(opened.length, 5);

    let mut buf = [0u8; 5];
    let read = client.read_block(opened.stream_id, 0, &mut buf).unwrap();
    assert!(read.is_ok());
    assert_eq!(read.bytes_read, 5);
    assert_eq!(&buf, b"hello");
    client.close(opened.stream_id).unwrap();

    let info = client.info("/dir/hello.txt").unwrap().into_payload().unwrap();
    assert_eq!(info.file_info.length, 5);
    assert!(!info.file_info.is_directory());
    assert_eq!(server.open_streams(), 0);
}

#[igfs_test_utils::logged_test]
fn delete_of_missing_file_reports_not_existing() {
    let server = MockIgfsServer::default();
    let mut client = client(&server);

    let response = client.delete("/nope", false).unwrap();
    assert!(response.is_ok());
    assert!(!response.payload().unwrap().exists);
}

#[igfs_test_utils::logged_test]
fn open_read_of_missing_file_has_no_payload() {
    let server = MockIgfsServer::default();
    let mut client = client(&server);

    let response = client.open_read("/missing").unwrap();
    assert!(response.is_ok());
    assert_eq!(response.into_payload(), Some(None));
}

#[igfs_test_utils::logged_test]
fn prefetch_hint_reaches_the_server() {
    let server = MockIgfsServer::default();
    server.put_file("/f", b"abc").unwrap();
    let mut client = client(&server);

    client.open_read_with_prefetch("/f", 3).unwrap();
    let history = server.history();
    match history.last() {
        Some(IgfsRequest::OpenRead(request)) => {
            assert!(request.control.flag);
            assert_eq!(request.sequential_reads_before_prefetch, 3);
            assert_eq!(request.control.user_name, "tester");
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[igfs_test_utils::logged_test]
fn listings_and_renames() {
    let server = MockIgfsServer::default();
    server.put_file("/data/a", b"1").unwrap();
    server.put_file("/data/b", b"22").unwrap();
    let mut client = client(&server);

    assert!(client.mkdir("/data/sub").unwrap().payload().unwrap().successful);
    let paths: Vec<_> = client
        .list_paths("/data")
        .unwrap()
        .into_payload()
        .unwrap()
        .entries
        .into_iter()
        .map(|p| p.path)
        .collect();
    assert_eq!(paths, vec!["/data/a", "/data/b", "/data/sub"]);

    let files = client.list_files("/data").unwrap().into_payload().unwrap().entries;
    assert_eq!(files.iter().filter(|f| f.is_directory()).count(), 1);
    assert_eq!(files[1].length, 2);

    assert!(client.rename("/data/a", "/data/c").unwrap().payload().unwrap().successful);
    assert!(!client.exists("/data/a").unwrap().payload().unwrap().exists);
    assert!(client.exists("/data/c").unwrap().payload().unwrap().exists);
    assert!(!client.rename("/data/a", "/data/d").unwrap().payload().unwrap().successful);
}

#[igfs_test_utils::logged_test]
fn non_recursive_delete_of_directory_is_a_server_error() {
    let server = MockIgfsServer::default();
    server.put_file("/d/x", b"").unwrap();
    let mut client = client(&server);

    let response = client.delete("/d", false).unwrap();
    assert_eq!(response.error_code(), ERR_DIRECTORY_NOT_EMPTY);
    assert!(client.delete("/d", true).unwrap().payload().unwrap().exists);
    assert!(!server.exists("/d/x"));
}

#[igfs_test_utils::logged_test]
fn append_keeps_existing_content() {
    let server = MockIgfsServer::default();
    server.put_file("/log", b"one,").unwrap();
    let mut client = client(&server);

    let stream_id = client.open_append("/log").unwrap().payload().unwrap().stream_id;
    client.write_block(stream_id, b"two").unwrap();
    client.close(stream_id).unwrap();
    assert_eq!(server.file("/log").unwrap(), b"one,two");
}

#[igfs_test_utils::logged_test]
fn write_to_unknown_stream_surfaces_on_close() {
    let server = MockIgfsServer::default();
    let mut client = client(&server);

    client.write_block(99, b"lost").unwrap();
    let close = client.close(99).unwrap();
    assert!(!close.is_ok());
    assert_eq!(close.header.result_type, RES_TYPE_ERR_STREAM_ID);
    assert!(close.header.is_stream_id_error());
    assert_eq!(client.state(), ConnectionState::Idle);
}

#[igfs_test_utils::logged_test]
fn rejected_write_is_reported_by_close() {
    let server = MockIgfsServer::default();
    let mut client = client(&server);
    let stream_id = client.open_create("/f").unwrap().payload().unwrap().stream_id;

    server.fail_command(Command::WriteBlock, 42, "disk full");
    client.write_block(stream_id, b"data").unwrap();
    let close = client.close(stream_id).unwrap();
    assert_eq!(close.error_code(), 42);
    assert_eq!(close.error_message(), "disk full");
}

#[igfs_test_utils::logged_test]
fn scripted_failure_hits_only_the_next_matching_request() {
    let server = MockIgfsServer::default();
    server.put_file("/f", b"abc").unwrap();
    let mut client = client(&server);

    server.fail_command(Command::Info, 7, "injected");
    assert!(client.exists("/f").unwrap().is_ok());
    let failed = client.info("/f").unwrap();
    assert_eq!(failed.error_code(), 7);
    assert!(failed.payload().is_none());
    assert!(client.info("/f").unwrap().is_ok());
}

#[igfs_test_utils::logged_test]
fn read_block_error_keeps_the_connection_usable() {
    let server = MockIgfsServer::default();
    let mut client = client(&server);

    let mut buf = [0u8; 8];
    let response = client.read_block(12345, 0, &mut buf).unwrap();
    assert!(!response.is_ok());
    assert_eq!(response.bytes_read, 0);
    assert!(client.exists("/").unwrap().is_ok());
}

#[igfs_test_utils::logged_test]
fn severed_connection_breaks_the_client() {
    let server = MockIgfsServer::default();
    let mut client = client(&server);
    let before = server.commands().len();

    server.sever();
    assert!(matches!(client.exists("/"), Err(ClientError::Proto(_))));
    assert_eq!(client.state(), ConnectionState::Broken);
    assert!(matches!(client.exists("/"), Err(ClientError::ConnectionBroken)));
    assert_eq!(server.commands().len(), before);
}

#[igfs_test_utils::logged_test]
fn every_request_carries_the_configured_user() {
    let server = MockIgfsServer::default();
    let mut client = client(&server);
    client.exists("/a").unwrap();
    client.mkdir("/b").unwrap();
    client.list_paths("/").unwrap();

    let users: Vec<_> = server
        .history()
        .iter()
        .filter_map(|request| request.path_control().map(|c| c.user_name.clone()))
        .collect();
    assert_eq!(users, vec!["tester"; 3]);
    assert_eq!(server.commands()[0], Command::Handshake);
}
