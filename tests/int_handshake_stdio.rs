mod support;

use std::io::Write;
use std::os::unix::net::UnixStream;

use opipes::meta::{read_document, write_document};
use opipes::{PipeError, PipeReader, PipeWriter, Session, UpstreamAddress};
use support::{argv, dir_is_empty, pipe_pair, read_back, regular_file};

#[test]
fn int_unpiped_stdout_never_listens_or_announces() {
    let td = tempfile::tempdir().expect("tmpdir");
    let stdout = tempfile::tempfile().expect("tmpfile");
    let mut probe = stdout.try_clone().unwrap();
    let s = Session::with_stdio("cat", argv(&["cat"]), regular_file("in"), stdout)
        .unwrap()
        .with_runtime_dir(td.path());

    let pipe = s.establish_pipe().unwrap().expect("pipe");
    assert!(pipe.downstream.is_none());
    assert!(matches!(pipe.writer, PipeWriter::Inherited(_)));
    assert!(matches!(pipe.reader, PipeReader::Inherited(_)));
    assert_eq!(read_back(&mut probe), "");
    assert!(dir_is_empty(td.path()));
}

#[test]
fn int_unpiped_stdin_is_consumed_once() {
    let s = Session::with_stdio(
        "cat",
        argv(&["cat"]),
        regular_file("hello"),
        tempfile::tempfile().unwrap(),
    )
    .unwrap();

    let first = s.establish_pipe().unwrap();
    assert!(first.is_some());
    assert!(s.stdin_consumed());

    let second = s.establish_pipe().unwrap();
    assert!(second.is_none(), "second call must report nothing to do");

    // Clones share the guard.
    let again = s.clone();
    assert!(again.establish_pipe().unwrap().is_none());
}

#[test]
fn int_upstream_closing_without_address_means_nothing_to_do() {
    let (r, w) = pipe_pair();
    drop(w);
    let s = Session::with_stdio("cat", argv(&["cat"]), r, tempfile::tempfile().unwrap()).unwrap();
    assert!(s.stdin_is_pipe());
    assert!(s.establish_pipe().unwrap().is_none());
}

#[test]
fn int_malformed_address_is_protocol_error() {
    let (r, mut w) = pipe_pair();
    w.write_all(b"hello world\n").unwrap();
    drop(w);
    let s = Session::with_stdio("cat", argv(&["cat"]), r, tempfile::tempfile().unwrap()).unwrap();
    let e = s.establish_pipe().unwrap_err();
    assert!(matches!(e, PipeError::Protocol(_)), "{e}");
}

#[test]
fn int_address_from_upstream_yields_pending_reader_with_self_description() {
    let (r, w) = pipe_pair();
    write_document(
        &w,
        &UpstreamAddress {
            address: "/nonexistent/opipes-9.sock".into(),
        },
    )
    .unwrap();
    drop(w);
    let s = Session::with_stdio(
        "grep",
        argv(&["grep", "ERROR"]),
        r,
        tempfile::tempfile().unwrap(),
    )
    .unwrap();

    let pipe = s.establish_pipe().unwrap().expect("pipe");
    match &pipe.reader {
        PipeReader::Pending(dial) => {
            assert_eq!(dial.address().to_str(), Some("/nonexistent/opipes-9.sock"));
            assert_eq!(dial.description().args, argv(&["grep", "ERROR"]));
            assert!(dial.description().next.is_none());
        }
        other => panic!("expected pending reader, got {other:?}"),
    }
}

/// Stage with a piped stdout whose right neighbor misbehaves after dialing.
fn listen_and_feed(payload: &'static [u8]) -> PipeError {
    let td = tempfile::tempdir().expect("tmpdir");
    let (out_r, out_w) = pipe_pair();
    let s = Session::with_stdio("seq", argv(&["seq", "3"]), regular_file(""), out_w)
        .unwrap()
        .with_runtime_dir(td.path());

    let peer = std::thread::spawn(move || {
        let addr: UpstreamAddress = read_document(&out_r).unwrap().unwrap();
        let mut conn = UnixStream::connect(&addr.address).unwrap();
        conn.write_all(payload).unwrap();
    });

    let e = s.establish_pipe().unwrap_err();
    peer.join().unwrap();
    assert!(dir_is_empty(td.path()), "socket file left behind");
    e
}

#[test]
fn int_peer_sending_empty_argv_is_protocol_error() {
    let e = listen_and_feed(br#"{"args":[],"next":null}"#);
    assert!(matches!(e, PipeError::Protocol(_)), "{e}");
}

#[test]
fn int_peer_closing_without_description_is_protocol_error() {
    let e = listen_and_feed(b"");
    assert!(matches!(e, PipeError::Protocol(_)), "{e}");
}
