//! `PING`, `ECHO`, `QUIT`, `SELECT`, `CLIENT {ID|GETNAME|SETNAME}`.

use bytes::Bytes;

use crate::db::{Ctx, Instance, Reply};
use crate::resp::Piece;

use super::{lower, parse_i64, unknown_subcommand, wrong_args};

pub fn register(inst: &mut Instance) {
    inst.register("ping", ping);
    inst.register("echo", echo);
    inst.register("quit", quit);
    inst.register("select", select);
    inst.register("client", client);
}

fn ping(_inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    match args.len() {
        0 => Reply::new(Piece::SimpleString("PONG".into())),
        1 => Reply::new(Piece::bulk(args[0].clone())),
        _ => wrong_args("ping"),
    }
}

fn echo(_inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 1 {
        return wrong_args("echo");
    }
    Reply::new(Piece::bulk(args[0].clone()))
}

fn quit(_inst: &mut Instance, _ctx: &mut Ctx, _args: &[Bytes]) -> Reply {
    Reply::close(Piece::ok())
}

fn select(inst: &mut Instance, _ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 1 {
        return wrong_args("select");
    }
    let index = match parse_i64(&args[0]) {
        Some(n) if n >= 0 => n as usize,
        _ => return super::not_integer(),
    };
    if inst.select(index) {
        Reply::new(Piece::ok())
    } else {
        Reply::new(Piece::error("DB index is out of range"))
    }
}

fn client(inst: &mut Instance, ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.is_empty() {
        return wrong_args("client");
    }
    match lower(&args[0]).as_str() {
        "getname" => client_getname(inst, ctx, args),
        "id" => client_id(inst, ctx, args),
        "setname" => client_setname(inst, ctx, args),
        _ => unknown_subcommand("client", &args[0]),
    }
}

fn client_getname(_inst: &mut Instance, ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 1 {
        return wrong_args("client|getname");
    }
    match ctx.client_name {
        Some(name) => Reply::new(Piece::bulk(name.clone())),
        None => Reply::new(Piece::nil()),
    }
}

fn client_id(_inst: &mut Instance, ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 1 {
        return wrong_args("client|id");
    }
    Reply::new(Piece::Integer(ctx.session_id as i64))
}

fn client_setname(_inst: &mut Instance, ctx: &mut Ctx, args: &[Bytes]) -> Reply {
    if args.len() != 2 {
        return wrong_args("client|setname");
    }
    *ctx.client_name = Some(args[1].clone());
    Reply::new(Piece::ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(name: &mut Option<Bytes>) -> Ctx<'_> {
        Ctx {
            session_id: 7,
            client_name: name,
        }
    }

    #[test]
    fn ping_without_args_is_simple_pong() {
        let mut inst = Instance::new(1);
        let mut name = None;
        let reply = ping(&mut inst, &mut ctx(&mut name), &[]);
        assert_eq!(reply.piece, Piece::SimpleString("PONG".into()));
    }

    #[test]
    fn ping_with_message_echoes_as_bulk() {
        let mut inst = Instance::new(1);
        let mut name = None;
        let reply = ping(&mut inst, &mut ctx(&mut name), &[Bytes::from_static(b"hi")]);
        assert_eq!(reply.piece, Piece::bulk(Bytes::from_static(b"hi")));
    }

    #[test]
    fn select_out_of_range_is_an_error() {
        let mut inst = Instance::new(2);
        let mut name = None;
        let reply = select(&mut inst, &mut ctx(&mut name), &[Bytes::from_static(b"9")]);
        match reply.piece {
            Piece::Error(msg) => assert_eq!(msg, "DB index is out of range"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn client_setname_then_getname_round_trips() {
        let mut inst = Instance::new(1);
        let mut name = None;
        client_setname(&mut inst, &mut ctx(&mut name), &[Bytes::from_static(b"client"), Bytes::from_static(b"bob")]);
        let reply = client_getname(&mut inst, &mut ctx(&mut name), &[Bytes::from_static(b"client")]);
        assert_eq!(reply.piece, Piece::bulk(Bytes::from_static(b"bob")));
    }

    #[test]
    fn quit_sets_close_after_send() {
        let mut inst = Instance::new(1);
        let mut name = None;
        let reply = quit(&mut inst, &mut ctx(&mut name), &[]);
        assert!(reply.close_after_send);
    }
}
