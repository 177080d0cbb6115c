//! `GET`, `SET`, `APPEND`, `STRLEN`, `GETDEL`, `GETRANGE`, the
//! `INCR`/`DECR` family, and `MGET`/`MSET`/`MSETNX`.

use bytes::Bytes;

use crate::db::{Ctx, Instance, ObjType, Object, Reply};
use crate::resp::Piece;

use super::{not_integer, wrong_args, wrongtype};

pub fn register(inst: &mut Instance) {
    inst.register("get", get);
    inst.register("set", set);
    inst.register("append", append);
    inst.register("strlen", strlen);
    inst.register("getdel", getdel);
    inst.register("getrange", getrange);
    inst.register("incr", incr);
    inst.register("decr", decr);
    inst.register("incrby", incrby);
    inst.register("decrby", decrby);
    inst.register("mget", mget);
    inst.register("mset", mset);
    inst.register("msetnx", msetnx);
}

fn get(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 1 {
        return wrong_args("get");
    }
    let db = inst.current_db();
    match db.get(&args[0]) {
        None => Reply::new(Piece::nil()),
        Some(obj) if obj.obj_type() != ObjType::String => wrongtype(),
        Some(obj) => Reply::new(Piece::bulk(obj.string_bytes())),
    }
}

fn set(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 2 {
        return wrong_args("set");
    }
    let db = inst.current_db();
    db.set(args[0].clone(), Object::new_string(args[1].clone()));
    Reply::new(Piece::ok())
}

fn append(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 2 {
        return wrong_args("append");
    }
    let db = inst.current_db();
    match db.get_mut(&args[0]) {
        None => {
            db.set(args[0].clone(), Object::new_string(args[1].clone()));
            Reply::new(Piece::Integer(args[1].len() as i64))
        }
        Some(obj) if obj.obj_type() != ObjType::String => wrongtype(),
        Some(obj) => {
            let mut combined = Vec::with_capacity(obj.string_bytes().len() + args[1].len());
            combined.extend_from_slice(&obj.string_bytes());
            combined.extend_from_slice(&args[1]);
            let len = combined.len();
            obj.set_string(Bytes::from(combined));
            Reply::new(Piece::Integer(len as i64))
        }
    }
}

fn strlen(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 1 {
        return wrong_args("strlen");
    }
    let db = inst.current_db();
    match db.get(&args[0]) {
        None => Reply::new(Piece::Integer(0)),
        Some(obj) if obj.obj_type() != ObjType::String => wrongtype(),
        Some(obj) => Reply::new(Piece::Integer(obj.string_bytes().len() as i64)),
    }
}

fn getdel(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 1 {
        return wrong_args("getdel");
    }
    let db = inst.current_db();
    match db.get(&args[0]) {
        None => Reply::new(Piece::nil()),
        Some(obj) if obj.obj_type() != ObjType::String => wrongtype(),
        Some(obj) => {
            let value = obj.string_bytes();
            db.remove(&args[0]);
            Reply::new(Piece::bulk(value))
        }
    }
}

fn getrange(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 3 {
        return wrong_args("getrange");
    }
    let (start, end) = match (super::parse_i64(&args[1]), super::parse_i64(&args[2])) {
        (Some(s), Some(e)) => (s, e),
        _ => return not_integer(),
    };
    let db = inst.current_db();
    let value = match db.get(&args[0]) {
        None => return Reply::new(Piece::bulk(Bytes::new())),
        Some(obj) if obj.obj_type() != ObjType::String => return wrongtype(),
        Some(obj) => obj.string_bytes(),
    };
    Reply::new(Piece::bulk(slice_range(&value, start, end)))
}

/// Resolve Redis-style (possibly negative, inclusive) `start`/`end` indices
/// against `value`'s length and return the selected byte range.
fn slice_range(value: &Bytes, start: i64, end: i64) -> Bytes {
    let len = value.len() as i64;
    if len == 0 {
        return Bytes::new();
    }
    let norm = |i: i64| -> i64 {
        if i < 0 {
            (len + i).max(0)
        } else {
            i
        }
    };
    let start = norm(start).min(len - 1);
    let end = norm(end).min(len - 1);
    if start > end || start >= len {
        return Bytes::new();
    }
    value.slice((start as usize)..(end as usize + 1))
}

fn incr_by(inst: &mut Instance, args: &[Bytes], cmd: &str, delta: i64) -> Reply {
    if args.len() != 1 {
        return wrong_args(cmd);
    }
    let db = inst.current_db();
    let current = match db.get(&args[0]) {
        None => 0i64,
        Some(obj) if obj.obj_type() != ObjType::String => return wrongtype(),
        Some(obj) => match super::parse_i64(&obj.string_bytes()) {
            Some(n) => n,
            None => return not_integer(),
        },
    };
    let next = match current.checked_add(delta) {
        Some(n) => n,
        None => {
            return Reply::new(Piece::error(
                "increment or decrement would overflow",
            ))
        }
    };
    db.set(args[0].clone(), Object::new_string(Bytes::from(next.to_string())));
    Reply::new(Piece::Integer(next))
}

fn incr(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    incr_by(inst, args, "incr", 1)
}

fn decr(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    incr_by(inst, args, "decr", -1)
}

fn incrby(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 2 {
        return wrong_args("incrby");
    }
    let delta = match super::parse_i64(&args[1]) {
        Some(n) => n,
        None => return not_integer(),
    };
    incr_by(inst, &args[..1], "incrby", delta)
}

fn decrby(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 2 {
        return wrong_args("decrby");
    }
    let delta = match super::parse_i64(&args[1]) {
        Some(n) => n,
        None => return not_integer(),
    };
    let delta = match delta.checked_neg() {
        Some(n) => n,
        None => return Reply::new(Piece::error("increment or decrement would overflow")),
    };
    incr_by(inst, &args[..1], "decrby", delta)
}

fn mget(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.is_empty() {
        return wrong_args("mget");
    }
    let db = inst.current_db();
    let pieces = args
        .iter()
        .map(|key| match db.get(key) {
            Some(obj) if obj.obj_type() == ObjType::String => Piece::bulk(obj.string_bytes()),
            _ => Piece::nil(),
        })
        .collect();
    Reply::new(Piece::Array(pieces))
}

fn mset(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.is_empty() || args.len() % 2 != 0 {
        return wrong_args("mset");
    }
    let db = inst.current_db();
    for pair in args.chunks_exact(2) {
        db.set(pair[0].clone(), Object::new_string(pair[1].clone()));
    }
    Reply::new(Piece::ok())
}

fn msetnx(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.is_empty() || args.len() % 2 != 0 {
        return wrong_args("msetnx");
    }
    let db = inst.current_db();
    let any_exists = args.chunks_exact(2).any(|pair| db.contains(&pair[0]));
    if any_exists {
        return Reply::new(Piece::Integer(0));
    }
    for pair in args.chunks_exact(2) {
        db.set(pair[0].clone(), Object::new_string(pair[1].clone()));
    }
    Reply::new(Piece::Integer(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(name: &mut Option<Bytes>) -> Ctx<'_> {
        Ctx {
            session_id: 1,
            client_name: name,
        }
    }

    #[test]
    fn set_then_get_round_trips_arbitrary_bytes() {
        let mut inst = Instance::new(1);
        let mut name = None;
        set(&mut inst, &mut ctx(&mut name), &[Bytes::from_static(b"k"), Bytes::from_static(b"\x00hi\xff")]);
        let reply = get(&mut inst, &mut ctx(&mut name), &[Bytes::from_static(b"k")]);
        assert_eq!(reply.piece, Piece::bulk(Bytes::from_static(b"\x00hi\xff")));
    }

    #[test]
    fn incr_after_set_string_digit_yields_textual_result() {
        let mut inst = Instance::new(1);
        let mut name = None;
        set(&mut inst, &mut ctx(&mut name), &[Bytes::from_static(b"k"), Bytes::from_static(b"3")]);
        incr(&mut inst, &mut ctx(&mut name), &[Bytes::from_static(b"k")]);
        let reply = get(&mut inst, &mut ctx(&mut name), &[Bytes::from_static(b"k")]);
        assert_eq!(reply.piece, Piece::bulk(Bytes::from_static(b"4")));
    }

    #[test]
    fn append_switches_encoding_from_int_to_raw() {
        let mut inst = Instance::new(1);
        let mut name = None;
        set(&mut inst, &mut ctx(&mut name), &[Bytes::from_static(b"k"), Bytes::from_static(b"42")]);
        append(&mut inst, &mut ctx(&mut name), &[Bytes::from_static(b"k"), Bytes::from_static(b"x")]);
        let db = inst.current_db();
        assert_eq!(db.get(b"k").unwrap().encoding().name(), "raw");
        assert_eq!(db.get(b"k").unwrap().string_bytes(), Bytes::from_static(b"42x"));
    }

    #[test]
    fn mset_then_mget_reports_nil_for_missing_key() {
        let mut inst = Instance::new(1);
        let mut name = None;
        mset(
            &mut inst,
            &mut ctx(&mut name),
            &[Bytes::from_static(b"a"), Bytes::from_static(b"1"), Bytes::from_static(b"b"), Bytes::from_static(b"2")],
        );
        let reply = mget(
            &mut inst,
            &mut ctx(&mut name),
            &[Bytes::from_static(b"a"), Bytes::from_static(b"b"), Bytes::from_static(b"c")],
        );
        assert_eq!(
            reply.piece,
            Piece::Array(vec![
                Piece::bulk(Bytes::from_static(b"1")),
                Piece::bulk(Bytes::from_static(b"2")),
                Piece::nil(),
            ])
        );
    }

    #[test]
    fn msetnx_does_nothing_if_any_key_already_exists() {
        let mut inst = Instance::new(1);
        let mut name = None;
        set(&mut inst, &mut ctx(&mut name), &[Bytes::from_static(b"a"), Bytes::from_static(b"x")]);
        let reply = msetnx(
            &mut inst,
            &mut ctx(&mut name),
            &[Bytes::from_static(b"a"), Bytes::from_static(b"1"), Bytes::from_static(b"b"), Bytes::from_static(b"2")],
        );
        assert_eq!(reply.piece, Piece::Integer(0));
        assert!(inst.current_db().get(b"b").is_none());
    }

    #[test]
    fn getrange_supports_negative_indices() {
        let mut inst = Instance::new(1);
        let mut name = None;
        set(&mut inst, &mut ctx(&mut name), &[Bytes::from_static(b"k"), Bytes::from_static(b"hello world")]);
        let reply = getrange(
            &mut inst,
            &mut ctx(&mut name),
            &[Bytes::from_static(b"k"), Bytes::from_static(b"-5"), Bytes::from_static(b"-1")],
        );
        assert_eq!(reply.piece, Piece::bulk(Bytes::from_static(b"world")));
    }
}
