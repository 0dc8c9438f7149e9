use bytes::BytesMut;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use volley_client::engine::pending::{read_first_line, MAX_RESPONSE_LINE};

#[tokio::test]
async fn first_line_is_returned_without_terminator() {
    let data = b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n";
    let mut reader = &data[..];
    let mut buffer = BytesMut::new();

    let line = read_first_line(&mut reader, &mut buffer).await.unwrap();
    assert_eq!(line.as_deref(), Some("HTTP/1.1 204 No Content"));
}

#[tokio::test]
async fn lines_in_one_read_are_returned_in_order() {
    let data = b"PONG 1\r\nPONG 2\r\nPON";
    let mut reader = &data[..];
    let mut buffer = BytesMut::new();

    let first = read_first_line(&mut reader, &mut buffer).await.unwrap();
    assert_eq!(first.as_deref(), Some("PONG 1"));
    // The second line was already buffered by the first call.
    assert!(reader.is_empty());

    let second = read_first_line(&mut reader, &mut buffer).await.unwrap();
    assert_eq!(second.as_deref(), Some("PONG 2"));
    assert_eq!(&buffer[..], b"PON");

    let third = read_first_line(&mut reader, &mut buffer).await.unwrap();
    assert!(third.is_none());
}

#[tokio::test]
async fn terminator_split_across_reads_is_found() {
    let (mut client, mut server) = tokio::io::duplex(64);

    tokio::spawn(async move {
        for piece in [&b"PO"[..], b"NG\r", b"\nrest"] {
            server.write_all(piece).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });

    let mut buffer = BytesMut::new();
    let line = read_first_line(&mut client, &mut buffer).await.unwrap();
    assert_eq!(line.as_deref(), Some("PONG"));
}

#[tokio::test]
async fn eof_before_terminator_yields_none() {
    let data = b"partial response";
    let mut reader = &data[..];
    let mut buffer = BytesMut::new();

    let line = read_first_line(&mut reader, &mut buffer).await.unwrap();
    assert!(line.is_none());
}

#[tokio::test]
async fn overlong_line_is_rejected() {
    let data = vec![b'x'; MAX_RESPONSE_LINE + 4096];
    let mut reader = &data[..];
    let mut buffer = BytesMut::new();

    let err = read_first_line(&mut reader, &mut buffer).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}
