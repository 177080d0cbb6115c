//! `DEL`, `EXISTS`, `TYPE`, `TOUCH`, `RENAME[NX]`, the `EXPIRE` family,
//! `PERSIST`, `TTL`/`PTTL`, and `OBJECT {ENCODING|IDLETIME|REFCOUNT}`.

use bytes::Bytes;

use crate::db::{now_ms, Ctx, Instance, Reply};
use crate::resp::Piece;

use super::{lower, parse_i64, unknown_subcommand, wrong_args};

pub fn register(inst: &mut Instance) {
    inst.register("del", del);
    inst.register("exists", exists);
    inst.register("type", type_cmd);
    inst.register("touch", touch);
    inst.register("rename", rename);
    inst.register("renamenx", renamenx);
    inst.register("expire", expire);
    inst.register("pexpire", pexpire);
    inst.register("expireat", expireat);
    inst.register("pexpireat", pexpireat);
    inst.register("persist", persist);
    inst.register("ttl", ttl);
    inst.register("pttl", pttl);
    inst.register("object", object);
}

fn del(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.is_empty() {
        return wrong_args("del");
    }
    let db = inst.current_db();
    let count = args.iter().filter(|k| db.remove(k)).count();
    Reply::new(Piece::Integer(count as i64))
}

fn exists(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.is_empty() {
        return wrong_args("exists");
    }
    let db = inst.current_db();
    let count = args.iter().filter(|k| db.contains(k)).count();
    Reply::new(Piece::Integer(count as i64))
}

fn type_cmd(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 1 {
        return wrong_args("type");
    }
    let db = inst.current_db();
    match db.get(&args[0]) {
        Some(obj) => Reply::new(Piece::SimpleString(obj.obj_type().as_str().to_string())),
        None => Reply::new(Piece::SimpleString("none".to_string())),
    }
}

fn touch(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.is_empty() {
        return wrong_args("touch");
    }
    let now = now_ms();
    let db = inst.current_db();
    let mut count = 0;
    for key in args {
        if let Some(obj) = db.get_mut(key) {
            obj.touch(now);
            count += 1;
        }
    }
    Reply::new(Piece::Integer(count))
}

fn rename(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 2 {
        return wrong_args("rename");
    }
    let db = inst.current_db();
    if !db.contains(&args[0]) {
        return Reply::new(Piece::error("no such key"));
    }
    db.rename(&args[0], args[1].clone());
    Reply::new(Piece::ok())
}

fn renamenx(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 2 {
        return wrong_args("renamenx");
    }
    let db = inst.current_db();
    if !db.contains(&args[0]) {
        return Reply::new(Piece::error("no such key"));
    }
    if db.contains(&args[1]) {
        return Reply::new(Piece::Integer(0));
    }
    db.rename(&args[0], args[1].clone());
    Reply::new(Piece::Integer(1))
}

enum ExpireUnit {
    Seconds,
    Millis,
    SecondsAt,
    MillisAt,
}

fn set_expire(inst: &mut Instance, args: &[Bytes], cmd: &str, unit: ExpireUnit) -> Reply {
    if args.len() < 2 {
        return wrong_args(cmd);
    }
    let (mut nx, mut xx, mut gt, mut lt) = (false, false, false, false);
    for opt in &args[2..] {
        match lower(opt).as_str() {
            "nx" => nx = true,
            "xx" => xx = true,
            "gt" => gt = true,
            "lt" => lt = true,
            _ => {
                return Reply::new(Piece::error(format!(
                    "Unsupported option {}",
                    String::from_utf8_lossy(opt)
                )))
            }
        }
    }
    if nx && (xx || gt || lt) {
        return Reply::new(Piece::error(
            "NX and XX, GT or LT options at the same time are not compatible",
        ));
    }
    if gt && lt {
        return Reply::new(Piece::error(
            "GT and LT options at the same time are not compatible",
        ));
    }

    let time = match parse_i64(&args[1]) {
        Some(t) => t,
        None => return super::not_integer(),
    };
    let now = now_ms();
    let new_pttl = match unit {
        ExpireUnit::Seconds => time.saturating_mul(1000),
        ExpireUnit::Millis => time,
        ExpireUnit::SecondsAt => time.saturating_mul(1000) - now,
        ExpireUnit::MillisAt => time - now,
    }
    .max(0);

    let db = inst.current_db();
    let obj = match db.get_mut(&args[0]) {
        Some(obj) => obj,
        None => return Reply::new(Piece::Integer(0)),
    };
    let old_pttl = obj.pttl(now);

    let apply = if nx {
        old_pttl == -1
    } else if xx {
        if old_pttl == -1 {
            false
        } else if gt {
            new_pttl > old_pttl
        } else if lt {
            new_pttl < old_pttl
        } else {
            true
        }
    } else if gt {
        new_pttl > old_pttl
    } else if lt {
        new_pttl < old_pttl
    } else {
        true
    };

    if apply {
        obj.set_pttl(new_pttl, now);
        Reply::new(Piece::Integer(1))
    } else {
        Reply::new(Piece::Integer(0))
    }
}

fn expire(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    set_expire(inst, args, "expire", ExpireUnit::Seconds)
}

fn pexpire(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    set_expire(inst, args, "pexpire", ExpireUnit::Millis)
}

fn expireat(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    set_expire(inst, args, "expireat", ExpireUnit::SecondsAt)
}

fn pexpireat(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    set_expire(inst, args, "pexpireat", ExpireUnit::MillisAt)
}

fn persist(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 1 {
        return wrong_args("persist");
    }
    let db = inst.current_db();
    match db.get_mut(&args[0]) {
        Some(obj) if obj.has_expiry() => {
            obj.set_pttl(-1, now_ms());
            Reply::new(Piece::Integer(1))
        }
        _ => Reply::new(Piece::Integer(0)),
    }
}

fn ttl(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 1 {
        return wrong_args("ttl");
    }
    let now = now_ms();
    let db = inst.current_db();
    match db.get_mut(&args[0]) {
        None => Reply::new(Piece::Integer(-2)),
        Some(obj) => {
            let p = obj.pttl(now);
            Reply::new(Piece::Integer(if p == -1 { -1 } else { p / 1000 }))
        }
    }
}

fn pttl(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 1 {
        return wrong_args("pttl");
    }
    let now = now_ms();
    let db = inst.current_db();
    match db.get_mut(&args[0]) {
        None => Reply::new(Piece::Integer(-2)),
        Some(obj) => Reply::new(Piece::Integer(obj.pttl(now))),
    }
}

fn object(inst: &mut Instance, ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.is_empty() {
        return wrong_args("object");
    }
    match lower(&args[0]).as_str() {
        "encoding" => object_encoding(inst, ctx, args),
        "idletime" => object_idletime(inst, ctx, args),
        "refcount" => object_refcount(inst, ctx, args),
        _ => unknown_subcommand("object", &args[0]),
    }
}

fn object_encoding(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 2 {
        return wrong_args("object|encoding");
    }
    let db = inst.current_db();
    match db.get(&args[1]) {
        Some(obj) => Reply::new(Piece::bulk(Bytes::from_static(obj.encoding().name().as_bytes()))),
        None => Reply::new(Piece::nil()),
    }
}

fn object_idletime(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 2 {
        return wrong_args("object|idletime");
    }
    let now = now_ms();
    let db = inst.current_db();
    match db.get(&args[1]) {
        Some(obj) => Reply::new(Piece::Integer(obj.idle_time_ms(now) / 1000)),
        None => Reply::new(Piece::nil()),
    }
}

fn object_refcount(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 2 {
        return wrong_args("object|refcount");
    }
    let db = inst.current_db();
    match db.get(&args[1]) {
        Some(_) => Reply::new(Piece::Integer(1)),
        None => Reply::new(Piece::nil()),
    }
}
