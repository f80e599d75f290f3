//! Integration tests for the request executor and the client dispatch layer
//!
//! Every test runs against the scripted in-memory connector, so the exact
//! sequence of requests each operation produces can be asserted.


use std::time::Duration;
use tokio_util::sync::CancellationToken;
use webhdfs_core::http::{Endpoint, OperationRequest, Payload};
use webhdfs_core::{options, ErrorKind, Options, RetryPolicy};
use test_support::*;

const DATANODE: &str = "http://datanode:50075/webhdfs/v1/tmp/a?op=CREATE&namenoderpcaddress=nn:8020";

fn datanode() -> Endpoint {
    Endpoint::http("datanode", 50075)
}

fn lease_expired() -> Scripted {
    remote_exception(500, "LeaseExpiredException", "lease expired")
}

// Validation

#[tokio::test]
async fn test_unknown_option_rejected_before_io() {
    let connector = ScriptedConnector::new([]);
    let client = client_builder(&connector).build().unwrap();

    let err = client
        .create("/tmp/a", "data", options([("overwrite", "true"), ("colour", "red"), ("bogus", "1")]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    match err {
        webhdfs_core::Error::Validation { keys, .. } => assert_eq!(keys, vec!["bogus", "colour"]),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(connector.opened(), 0);
}

#[tokio::test]
async fn test_option_not_allowed_for_operation() {
    let connector = ScriptedConnector::new([]);
    let client = client_builder(&connector).build().unwrap();

    // `recursive` belongs to DELETE, not MKDIRS
    let err = client.mkdir("/tmp/d", options([("recursive", "true")])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("recursive"));
    assert_eq!(connector.opened(), 0);
}

#[tokio::test]
async fn test_chown_needs_owner_or_group() {
    let connector = ScriptedConnector::new([status(200, "")]);
    let client = client_builder(&connector).build().unwrap();

    let err = client.chown("/tmp/a", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(connector.opened(), 0);

    assert!(client.chown("/tmp/a", options([("group", "staff")])).await.unwrap());
    let requests = connector.requests();
    assert_eq!(requests[0].target, "/webhdfs/v1/tmp/a?op=SETOWNER&user.name=hdfs&group=staff");
}

#[tokio::test]
async fn test_touch_needs_a_time() {
    let connector = ScriptedConnector::new([]);
    let client = client_builder(&connector).build().unwrap();

    let err = client.touch("/tmp/a", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(connector.opened(), 0);
}

#[tokio::test]
async fn test_unknown_operation() {
    let connector = ScriptedConnector::new([]);
    let client = client_builder(&connector).build().unwrap();

    let err = client
        .executor()
        .execute(OperationRequest::new("CONCAT", "/tmp/a"), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownOperation);
    assert_eq!(connector.opened(), 0);
}

// Two-phase redirect

#[tokio::test]
async fn test_create_follows_redirect_to_datanode() {
    let connector = ScriptedConnector::new([redirect(DATANODE), created()]);
    let client = client_builder(&connector).build().unwrap();

    let created = client
        .create("/tmp/a", "hello", options([("overwrite", "true")]))
        .await
        .unwrap();
    assert!(created);

    let requests = connector.requests();
    assert_eq!(requests.len(), 2);

    let locate = &requests[0];
    assert_eq!(locate.endpoint, namenode());
    assert_eq!(locate.method, reqwest::Method::PUT);
    assert_eq!(locate.target, "/webhdfs/v1/tmp/a?op=CREATE&user.name=hdfs&overwrite=true");
    assert!(locate.body.is_none());

    let transfer = &requests[1];
    assert_eq!(transfer.endpoint, datanode());
    assert_eq!(transfer.method, reqwest::Method::PUT);
    assert_eq!(transfer.target, "/webhdfs/v1/tmp/a?op=CREATE&namenoderpcaddress=nn:8020");
    assert_eq!(transfer.body.as_deref(), Some(&b"hello"[..]));
    assert_eq!(transfer.header("content-type"), Some("application/octet-stream"));
    assert_eq!(transfer.header("content-length"), Some("5"));
}

#[tokio::test]
async fn test_create_reports_false_for_other_success_status() {
    let connector = ScriptedConnector::new([redirect(DATANODE), status(200, "")]);
    let client = client_builder(&connector).build().unwrap();
    assert!(!client.create("/tmp/a", "x", Options::new()).await.unwrap());
}

#[tokio::test]
async fn test_read_returns_datanode_body() {
    let connector = ScriptedConnector::new([
        redirect("http://datanode:50075/webhdfs/v1/tmp/a?op=OPEN&offset=10"),
        status(200, "file contents"),
    ]);
    let client = client_builder(&connector).build().unwrap();

    let data = client.read("/tmp/a", options([("offset", "10")])).await.unwrap();
    assert_eq!(&data[..], b"file contents");

    let requests = connector.requests();
    assert_eq!(requests[0].method, reqwest::Method::GET);
    assert_eq!(requests[0].target, "/webhdfs/v1/tmp/a?op=OPEN&user.name=hdfs&offset=10");
    assert_eq!(requests[1].target, "/webhdfs/v1/tmp/a?op=OPEN&offset=10");
    assert!(requests[1].body.is_none());
}

#[tokio::test]
async fn test_redirect_without_query() {
    let connector = ScriptedConnector::new([
        redirect("http://dn2:1004/webhdfs/v1/tmp/a"),
        json(r#"{"FileChecksum": {"algorithm": "MD5-of-0MD5-of-512CRC32C", "length": 28}}"#),
    ]);
    let client = client_builder(&connector).build().unwrap();

    let checksum = client.checksum("/tmp/a", Options::new()).await.unwrap();
    assert_eq!(checksum["length"], 28);

    let requests = connector.requests();
    assert_eq!(requests[1].endpoint, Endpoint::http("dn2", 1004));
    assert_eq!(requests[1].target, "/webhdfs/v1/tmp/a");
}

#[tokio::test]
async fn test_boolean_answer_without_json_content_type_is_protocol_error() {
    let connector = ScriptedConnector::new([status(200, r#"{"boolean": true}"#)]);
    let client = client_builder(&connector).build().unwrap();

    let err = client.mkdir("/tmp/a", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(err.status_code(), Some(200));
}

#[tokio::test]
async fn test_phase_one_success_is_protocol_error() {
    let connector = ScriptedConnector::new([status(200, "{}")]);
    let client = client_builder(&connector).build().unwrap();

    let err = client.append("/tmp/a", "x", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(err.status_code(), Some(200));
    assert_eq!(connector.requests().len(), 1);
}

#[tokio::test]
async fn test_redirect_without_location_is_protocol_error() {
    let connector = ScriptedConnector::new([status(307, "")]);
    let client = client_builder(&connector).build().unwrap();

    let err = client.read("/tmp/a", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(connector.requests().len(), 1);
}

#[tokio::test]
async fn test_phase_one_failure_is_classified() {
    let connector = ScriptedConnector::new([remote_exception(
        403,
        "AccessControlException",
        "Permission denied: user=hdfs",
    )]);
    let client = client_builder(&connector).build().unwrap();

    let err = client.create("/secure/a", "x", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Permission);
    assert_eq!(err.status_code(), Some(403));
    assert!(err.to_string().contains("AccessControlException"));
    assert_eq!(connector.requests().len(), 1);
}

// Single-phase operations

#[tokio::test]
async fn test_mkdir_returns_boolean() {
    let connector = ScriptedConnector::new([json(r#"{"boolean": true}"#)]);
    let client = client_builder(&connector).build().unwrap();

    assert!(client.mkdir("/tmp/d", options([("permission", "750")])).await.unwrap());

    let requests = connector.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, reqwest::Method::PUT);
    assert_eq!(requests[0].target, "/webhdfs/v1/tmp/d?op=MKDIRS&user.name=hdfs&permission=750");
}

#[tokio::test]
async fn test_rename_normalizes_destination() {
    let connector = ScriptedConnector::new([json(r#"{"boolean": false}"#)]);
    let client = client_builder(&connector).build().unwrap();

    assert!(!client.rename("/tmp/a", "tmp/b", Options::new()).await.unwrap());
    assert_eq!(
        connector.requests()[0].target,
        "/webhdfs/v1/tmp/a?op=RENAME&user.name=hdfs&destination=%2Ftmp%2Fb"
    );
}

#[tokio::test]
async fn test_delete_uses_delete_method() {
    let connector = ScriptedConnector::new([json(r#"{"boolean": true}"#)]);
    let client = client_builder(&connector).build().unwrap();

    assert!(client.delete("/tmp/d", options([("recursive", "true")])).await.unwrap());
    let request = &connector.requests()[0];
    assert_eq!(request.method, reqwest::Method::DELETE);
    assert_eq!(request.target, "/webhdfs/v1/tmp/d?op=DELETE&user.name=hdfs&recursive=true");
}

#[tokio::test]
async fn test_stat_and_list_extract_attributes() {
    let connector = ScriptedConnector::new([
        json(r#"{"FileStatus": {"type": "FILE", "length": 5}}"#),
        json(r#"{"FileStatuses": {"FileStatus": [{"pathSuffix": "a"}, {"pathSuffix": "b"}]}}"#),
        json(r#"{"ContentSummary": {"fileCount": 2}}"#),
    ]);
    let client = client_builder(&connector).build().unwrap();

    let status = client.stat("/tmp/a", Options::new()).await.unwrap();
    assert_eq!(status["type"], "FILE");

    let entries = client.list("/tmp", Options::new()).await.unwrap();
    assert_eq!(entries.as_array().map(Vec::len), Some(2));

    let summary = client.content_summary("/tmp", Options::new()).await.unwrap();
    assert_eq!(summary["fileCount"], 2);

    let ops: Vec<_> = connector.requests().into_iter().map(|r| r.target).collect();
    assert_eq!(
        ops,
        vec![
            "/webhdfs/v1/tmp/a?op=GETFILESTATUS&user.name=hdfs",
            "/webhdfs/v1/tmp?op=LISTSTATUS&user.name=hdfs",
            "/webhdfs/v1/tmp?op=GETCONTENTSUMMARY&user.name=hdfs",
        ]
    );
}

#[tokio::test]
async fn test_missing_attribute_is_protocol_error() {
    let connector = ScriptedConnector::new([json(r#"{"Unexpected": 1}"#)]);
    let client = client_builder(&connector).build().unwrap();

    let err = client.stat("/tmp/a", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[tokio::test]
async fn test_homedir_targets_root() {
    let connector = ScriptedConnector::new([json(r#"{"Path": "/user/hdfs"}"#)]);
    let client = client_builder(&connector).build().unwrap();

    assert_eq!(client.homedir(Options::new()).await.unwrap(), "/user/hdfs");
    assert_eq!(
        connector.requests()[0].target,
        "/webhdfs/v1/?op=GETHOMEDIRECTORY&user.name=hdfs"
    );
}

#[tokio::test]
async fn test_chmod_and_set_replication_inject_params() {
    let connector = ScriptedConnector::new([status(200, ""), json(r#"{"boolean": true}"#)]);
    let client = client_builder(&connector).build().unwrap();

    assert!(client.chmod("/tmp/a", "755", Options::new()).await.unwrap());
    assert!(client.set_replication("/tmp/a", 3, Options::new()).await.unwrap());

    let requests = connector.requests();
    assert_eq!(requests[0].target, "/webhdfs/v1/tmp/a?op=SETPERMISSION&user.name=hdfs&permission=755");
    assert_eq!(requests[1].target, "/webhdfs/v1/tmp/a?op=SETREPLICATION&user.name=hdfs&replication=3");
}

#[tokio::test]
async fn test_path_and_query_encoding() {
    let connector = ScriptedConnector::new([json(r#"{"boolean": true}"#)]);
    let client = client_builder(&connector).build().unwrap();

    client.rename("/tmp/with space?#", "/dest dir", Options::new()).await.unwrap();
    assert_eq!(
        connector.requests()[0].target,
        "/webhdfs/v1/tmp/with%20space%3F%23?op=RENAME&user.name=hdfs&destination=%2Fdest+dir"
    );
}

#[tokio::test]
async fn test_percent_and_backslash_reach_the_wire_escaped() {
    let connector = ScriptedConnector::new([json(r#"{"boolean": true}"#)]);
    let client = client_builder(&connector).build().unwrap();

    client.delete("/tmp/50%off\\x", Options::new()).await.unwrap();
    assert_eq!(
        connector.requests()[0].target,
        "/webhdfs/v1/tmp/50%25off%5Cx?op=DELETE&user.name=hdfs"
    );
}

#[tokio::test]
async fn test_dot_segments_rejected_before_io() {
    let connector = ScriptedConnector::new([]);
    let client = client_builder(&connector).build().unwrap();

    let err = client.read("/user/../../etc/conf", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(connector.opened(), 0);
}

// Identity and headers

#[tokio::test]
async fn test_doas_and_custom_headers_in_both_phases() {
    let connector = ScriptedConnector::new([redirect(DATANODE), created()]);
    let client = client_builder(&connector)
        .doas("alice")
        .header("X-Request-Source", "etl")
        .build()
        .unwrap();

    client.create("/tmp/a", "x", Options::new()).await.unwrap();

    let requests = connector.requests();
    assert_eq!(requests[0].target, "/webhdfs/v1/tmp/a?op=CREATE&user.name=hdfs&doas=alice");
    for request in &requests {
        assert_eq!(request.header("x-request-source"), Some("etl"));
    }
}

#[tokio::test]
async fn test_anonymous_requests_have_no_user() {
    let connector = ScriptedConnector::new([json(r#"{"Path": "/"}"#)]);
    let client = webhdfs_core::WebHdfsClient::builder("namenode", 50070)
        .connector(connector.clone())
        .build()
        .unwrap();

    client.homedir(Options::new()).await.unwrap();
    assert_eq!(connector.requests()[0].target, "/webhdfs/v1/?op=GETHOMEDIRECTORY");
}

// Error classification

#[tokio::test]
async fn test_status_codes_map_to_error_kinds() {
    let cases = [
        (400, ErrorKind::Validation),
        (401, ErrorKind::Auth),
        (403, ErrorKind::Permission),
        (404, ErrorKind::NotFound),
        (500, ErrorKind::Server),
        (502, ErrorKind::Protocol),
    ];

    for (code, kind) in cases {
        let connector = ScriptedConnector::new([status(code, "boom\n")]);
        let client = client_builder(&connector).build().unwrap();
        let err = client.stat("/tmp/a", Options::new()).await.unwrap_err();
        assert_eq!(err.kind(), kind, "status {code}");
        assert_eq!(err.status_code(), Some(code));
        assert!(err.to_string().contains("boom"));
        assert!(!err.to_string().contains('\n'));
    }
}

#[tokio::test]
async fn test_empty_error_body_gets_placeholder() {
    let connector = ScriptedConnector::new([status(404, "")]);
    let client = client_builder(&connector).build().unwrap();

    let err = client.stat("/missing", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("(empty response body)"));
}

#[tokio::test]
async fn test_transport_failure() {
    let connector = ScriptedConnector::new([Scripted::Fail]);
    let client = client_builder(&connector).build().unwrap();

    let err = client.stat("/tmp/a", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

// Retry

#[tokio::test(start_paused = true)]
async fn test_known_exception_is_retried_with_interval() {
    let connector = ScriptedConnector::new([lease_expired(), lease_expired(), json(r#"{"boolean": true}"#)]);
    let client = client_builder(&connector)
        .retry(RetryPolicy::new(3).with_interval(Duration::from_secs(2)))
        .build()
        .unwrap();

    let start = tokio::time::Instant::now();
    assert!(client.mkdir("/tmp/d", Options::new()).await.unwrap());
    assert!(start.elapsed() >= Duration::from_secs(4));
    assert_eq!(connector.requests().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded() {
    let connector = ScriptedConnector::new([lease_expired(), lease_expired(), lease_expired(), json("{}")]);
    let client = client_builder(&connector)
        .retry(RetryPolicy::new(3))
        .build()
        .unwrap();

    let err = client.mkdir("/tmp/d", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert!(err.to_string().contains("LeaseExpiredException"));
    assert_eq!(connector.requests().len(), 3);
}

#[tokio::test]
async fn test_unknown_exception_is_not_retried() {
    let connector = ScriptedConnector::new([
        remote_exception(500, "SafeModeException", "Name node is in safe mode"),
        json(r#"{"boolean": true}"#),
    ]);
    let client = client_builder(&connector)
        .retry(RetryPolicy::new(5).with_interval(Duration::ZERO))
        .build()
        .unwrap();

    let err = client.mkdir("/tmp/d", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(connector.requests().len(), 1);
}

#[tokio::test]
async fn test_retry_disabled_by_default() {
    let connector = ScriptedConnector::new([lease_expired(), json(r#"{"boolean": true}"#)]);
    let client = client_builder(&connector).build().unwrap();

    assert!(client.mkdir("/tmp/d", Options::new()).await.is_err());
    assert_eq!(connector.requests().len(), 1);
}

#[tokio::test]
async fn test_zero_interval_does_not_sleep() {
    let connector = ScriptedConnector::new([lease_expired(), json(r#"{"boolean": true}"#)]);
    let client = client_builder(&connector)
        .retry(RetryPolicy::new(2).with_interval_secs(0.0))
        .build()
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), client.mkdir("/tmp/d", Options::new())).await;
    assert!(result.unwrap().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_retry_in_phase_two_stays_on_datanode() {
    let connector = ScriptedConnector::new([redirect(DATANODE), lease_expired(), created()]);
    let client = client_builder(&connector)
        .retry(RetryPolicy::new(2))
        .build()
        .unwrap();

    assert!(client.create("/tmp/a", "payload", Options::new()).await.unwrap());

    let requests = connector.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].endpoint, namenode());
    assert_eq!(requests[1].endpoint, datanode());
    assert_eq!(requests[2].endpoint, datanode());
    assert_eq!(requests[2].body.as_deref(), Some(&b"payload"[..]));
}

#[tokio::test(start_paused = true)]
async fn test_streamed_payload_is_not_replayed() {
    let connector = ScriptedConnector::new([redirect(DATANODE), lease_expired(), created()]);
    let client = client_builder(&connector)
        .retry(RetryPolicy::new(3))
        .build()
        .unwrap();

    let payload = Payload::streamed(std::io::Cursor::new(b"streamed".to_vec()), 8);
    let err = client.create("/tmp/a", payload, Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(connector.requests().len(), 2);
}

#[tokio::test]
async fn test_streamed_payload_is_delivered() {
    let connector = ScriptedConnector::new([redirect(DATANODE), created()]);
    let client = client_builder(&connector).build().unwrap();

    let payload = Payload::streamed(std::io::Cursor::new(vec![7u8; 4096]), 4096);
    assert!(client.create("/tmp/a", payload, Options::new()).await.unwrap());

    let transfer = &connector.requests()[1];
    assert_eq!(transfer.body.as_ref().map(|b| b.len()), Some(4096));
    assert_eq!(transfer.header("content-length"), Some("4096"));
}

// HttpFS

#[tokio::test]
async fn test_httpfs_upload_is_single_phase() {
    let connector = ScriptedConnector::new([created(), status(200, "")]);
    let client = client_builder(&connector).httpfs_mode(true).build().unwrap();

    assert!(client.create("/tmp/a", "abc", Options::new()).await.unwrap());
    assert!(client.append("/tmp/a", "def", Options::new()).await.unwrap());

    let requests = connector.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].endpoint, namenode());
    assert_eq!(requests[0].target, "/webhdfs/v1/tmp/a?op=CREATE&user.name=hdfs&data=true");
    assert_eq!(requests[0].header("content-type"), Some("application/octet-stream"));
    assert_eq!(requests[0].body.as_deref(), Some(&b"abc"[..]));
    assert_eq!(requests[1].method, reqwest::Method::POST);
    assert_eq!(requests[1].target, "/webhdfs/v1/tmp/a?op=APPEND&user.name=hdfs&data=true");
}

#[tokio::test]
async fn test_httpfs_read_is_single_phase() {
    let connector = ScriptedConnector::new([status(200, "contents")]);
    let client = client_builder(&connector).httpfs_mode(true).build().unwrap();

    let data = client.read("/tmp/a", Options::new()).await.unwrap();
    assert_eq!(&data[..], b"contents");

    let requests = connector.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target, "/webhdfs/v1/tmp/a?op=OPEN&user.name=hdfs");
    assert!(requests[0].header("content-type").is_none());
}

// Kerberos

#[tokio::test]
async fn test_negotiate_header_on_every_request() {
    let connector = ScriptedConnector::new([redirect(DATANODE), created()]);
    let client = client_builder(&connector)
        .kerberos(Box::new(CountingContext::default()))
        .build()
        .unwrap();

    client.create("/tmp/a", "x", Options::new()).await.unwrap();
    for request in connector.requests() {
        assert_eq!(request.header("authorization"), Some(negotiate_header(1).as_str()));
    }
}

#[tokio::test]
async fn test_challenge_refreshes_token_and_resends() {
    let context = CountingContext::default();
    let inputs = context.inputs.clone();
    let connector = ScriptedConnector::new([challenge("server-token", None), json(r#"{"boolean": true}"#)]);
    let client = client_builder(&connector).kerberos(Box::new(context)).build().unwrap();

    assert!(client.mkdir("/tmp/d", Options::new()).await.unwrap());

    let requests = connector.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].header("authorization"), Some(negotiate_header(1).as_str()));
    assert_eq!(requests[1].header("authorization"), Some(negotiate_header(2).as_str()));
    assert_eq!(inputs.lock().unwrap().as_slice(), &[b"server-token".to_vec()]);
}

#[tokio::test]
async fn test_repeated_challenge_is_kerberos_error() {
    let connector = ScriptedConnector::new([challenge("a", None), challenge("b", None), json("{}")]);
    let client = client_builder(&connector)
        .kerberos(Box::new(CountingContext::default()))
        .build()
        .unwrap();

    let err = client.mkdir("/tmp/d", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Kerberos);
    assert_eq!(connector.requests().len(), 2);
}

#[tokio::test]
async fn test_challenge_without_token_is_kerberos_error() {
    let connector = ScriptedConnector::new([status(307, "")]);
    let client = client_builder(&connector)
        .kerberos(Box::new(CountingContext::default()))
        .build()
        .unwrap();

    let err = client.mkdir("/tmp/d", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Kerberos);
}

#[tokio::test]
async fn test_redirect_with_mutual_auth_token_proceeds() {
    let connector = ScriptedConnector::new([challenge("mutual", Some(DATANODE)), created()]);
    let client = client_builder(&connector)
        .kerberos(Box::new(CountingContext::default()))
        .build()
        .unwrap();

    assert!(client.create("/tmp/a", "x", Options::new()).await.unwrap());

    let requests = connector.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].endpoint, datanode());
    assert_eq!(requests[1].header("authorization"), Some(negotiate_header(2).as_str()));
}

#[tokio::test]
async fn test_307_is_plain_redirect_without_kerberos() {
    let connector = ScriptedConnector::new([challenge("ignored", None)]);
    let client = client_builder(&connector).build().unwrap();

    // Without Kerberos a Location-less 307 on a single-phase op is just returned
    let err = client.mkdir("/tmp/d", Options::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(connector.requests().len(), 1);
    assert!(connector.requests()[0].header("authorization").is_none());
}

// Cancellation

#[tokio::test(start_paused = true)]
async fn test_cancel_during_retry_sleep() {
    let connector = ScriptedConnector::new([lease_expired(), json(r#"{"boolean": true}"#)]);
    let client = client_builder(&connector)
        .retry(RetryPolicy::new(2).with_interval(Duration::from_secs(60)))
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = client
        .executor()
        .execute_with_cancel(OperationRequest::new("MKDIRS", "/tmp/d"), None, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(connector.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_send() {
    let connector = ScriptedConnector::new([Scripted::Hang]);
    let client = client_builder(&connector).build().unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = client
        .executor()
        .execute_with_cancel(OperationRequest::new("GETFILESTATUS", "/tmp/a"), None, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_cancelled_token_prevents_io() {
    let connector = ScriptedConnector::new([json("{}")]);
    let client = client_builder(&connector).build().unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = client
        .executor()
        .execute_with_cancel(OperationRequest::new("GETFILESTATUS", "/tmp/a"), None, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(connector.opened(), 0);
}

#[tokio::test]
async fn test_concurrent_operations_share_one_client() {
    let connector = ScriptedConnector::new((0..8).map(|_| json(r#"{"boolean": true}"#)));
    let client = std::sync::Arc::new(client_builder(&connector).build().unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move { client.mkdir(&format!("/tmp/d{i}"), Options::new()).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }
    assert_eq!(connector.requests().len(), 8);
}
