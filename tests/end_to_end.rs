//! Concrete end-to-end scenarios: raw wire bytes in, raw wire bytes out,
//! through the real parser, dispatch, and serializer — the same pipeline
//! `Session::on_recv`/`process` drive, minus the socket itself.

use std::thread::sleep;
use std::time::Duration;

use bytes::Bytes;
use tiny_redis::cmd;
use tiny_redis::db::{Ctx, Instance};
use tiny_redis::resp::{Piece, RequestParser};

fn instance() -> Instance {
    let mut inst = Instance::new(16);
    cmd::register_all(&mut inst);
    inst
}

fn roundtrip(inst: &mut Instance, client_name: &mut Option<Bytes>, wire: &[u8]) -> Vec<Bytes> {
    let mut parser = RequestParser::new();
    let requests = parser.feed(wire).expect("well-formed request");
    let mut ctx = Ctx {
        session_id: 1,
        client_name,
    };
    requests
        .iter()
        .map(|req| inst.dispatch(req, &mut ctx).piece.serialize())
        .collect()
}

#[test]
fn ping_without_args_replies_pong() {
    let mut inst = instance();
    let mut name = None;
    let replies = roundtrip(&mut inst, &mut name, b"*1\r\n$4\r\nPING\r\n");
    assert_eq!(replies, vec![Bytes::from_static(b"+PONG\r\n")]);
}

#[test]
fn set_then_get_round_trips_the_value() {
    let mut inst = instance();
    let mut name = None;
    let replies = roundtrip(
        &mut inst,
        &mut name,
        b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$5\r\nhello\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n",
    );
    assert_eq!(
        replies,
        vec![
            Bytes::from_static(b"+OK\r\n"),
            Bytes::from_static(b"$5\r\nhello\r\n"),
        ]
    );
}

#[test]
fn exists_on_a_missing_key_is_zero() {
    let mut inst = instance();
    let mut name = None;
    let replies = roundtrip(&mut inst, &mut name, b"*2\r\n$6\r\nEXISTS\r\n$7\r\nmissing\r\n");
    assert_eq!(replies, vec![Bytes::from_static(b":0\r\n")]);
}

#[test]
fn append_flips_encoding_from_int_to_raw() {
    let mut inst = instance();
    let mut name = None;

    let replies = roundtrip(&mut inst, &mut name, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$2\r\n42\r\n");
    assert_eq!(replies, vec![Bytes::from_static(b"+OK\r\n")]);

    let replies = roundtrip(
        &mut inst,
        &mut name,
        b"*3\r\n$6\r\nOBJECT\r\n$8\r\nENCODING\r\n$1\r\nk\r\n",
    );
    assert_eq!(replies, vec![Bytes::from_static(b"$3\r\nint\r\n")]);

    let replies = roundtrip(&mut inst, &mut name, b"*3\r\n$6\r\nAPPEND\r\n$1\r\nk\r\n$1\r\nx\r\n");
    assert_eq!(replies, vec![Bytes::from_static(b":3\r\n")]);

    let replies = roundtrip(
        &mut inst,
        &mut name,
        b"*3\r\n$6\r\nOBJECT\r\n$8\r\nENCODING\r\n$1\r\nk\r\n",
    );
    assert_eq!(replies, vec![Bytes::from_static(b"$3\r\nraw\r\n")]);

    let replies = roundtrip(&mut inst, &mut name, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n");
    assert_eq!(replies, vec![Bytes::from_static(b"$3\r\n42x\r\n")]);
}

#[test]
fn pexpire_then_pttl_then_expiry_clears_the_key() {
    let mut inst = instance();
    let mut name = None;

    roundtrip(&mut inst, &mut name, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n");
    roundtrip(&mut inst, &mut name, b"*3\r\n$7\r\nPEXPIRE\r\n$1\r\nk\r\n$3\r\n100\r\n");

    let replies = roundtrip(&mut inst, &mut name, b"*2\r\n$4\r\nPTTL\r\n$1\r\nk\r\n");
    let piece = replies[0].clone();
    let text = std::str::from_utf8(&piece).unwrap();
    let n: i64 = text.trim_start_matches(':').trim_end().parse().unwrap();
    assert!((1..=100).contains(&n), "pttl {n} out of range");

    sleep(Duration::from_millis(150));

    let replies = roundtrip(&mut inst, &mut name, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n");
    assert_eq!(replies, vec![Bytes::from_static(b"$-1\r\n")]);

    let replies = roundtrip(&mut inst, &mut name, b"*2\r\n$6\r\nEXISTS\r\n$1\r\nk\r\n");
    assert_eq!(replies, vec![Bytes::from_static(b":0\r\n")]);
}

#[test]
fn malformed_input_is_rejected_by_the_parser_before_dispatch() {
    let mut parser = RequestParser::new();
    let err = parser.feed(b"*1\r\n+PING\r\n").unwrap_err();
    // The session layer turns this into one `-…` reply and closes the
    // connection; here we just confirm the parser itself refuses the
    // malformed bulk-string type marker rather than silently recovering.
    assert!(!err.0.is_empty());
}

#[test]
fn mset_then_mget_reports_nil_for_a_missing_key() {
    let mut inst = instance();
    let mut name = None;
    roundtrip(
        &mut inst,
        &mut name,
        b"*5\r\n$4\r\nMSET\r\n$1\r\na\r\n$1\r\n1\r\n$1\r\nb\r\n$1\r\n2\r\n",
    );
    let replies = roundtrip(
        &mut inst,
        &mut name,
        b"*4\r\n$4\r\nMGET\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n",
    );
    assert_eq!(
        replies,
        vec![Bytes::from_static(
            b"*3\r\n$1\r\n1\r\n$1\r\n2\r\n$-1\r\n"
        )]
    );
}

#[test]
fn client_setname_then_getname_round_trips_through_ctx() {
    let mut inst = instance();
    let mut name = None;
    let replies = roundtrip(
        &mut inst,
        &mut name,
        b"*3\r\n$6\r\nCLIENT\r\n$7\r\nSETNAME\r\n$5\r\nalice\r\n",
    );
    assert_eq!(replies, vec![Bytes::from_static(b"+OK\r\n")]);

    let replies = roundtrip(&mut inst, &mut name, b"*2\r\n$6\r\nCLIENT\r\n$7\r\nGETNAME\r\n");
    assert_eq!(replies, vec![Piece::bulk(Bytes::from_static(b"alice")).serialize()]);
}
