//! A thin RESP line client for poking at a running server by hand.
//!
//! Unlike a typed client with one method per command, this forwards
//! whatever command and arguments were given on the command line verbatim,
//! the way `redis-cli` does for anything beyond its built-in subcommands —
//! this server's surface is too broad for a one-method-per-command client
//! to stay worth the maintenance.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::process::ExitCode;

use bytes::{Bytes, BytesMut};
use clap::Parser;

use tiny_redis::resp::Piece;
use tiny_redis::DEFAULT_PORT;

#[derive(Parser)]
#[clap(name = "tiny-redis-cli", version, about = "A Redis-compatible client")]
struct Cli {
    #[clap(long = "host", default_value = "127.0.0.1")]
    host: String,

    #[clap(long = "port", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Command name and arguments, e.g. `SET foo bar` or `GET foo`.
    #[clap(required = true)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tiny-redis-cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> io::Result<()> {
    let addr = format!("{}:{}", cli.host, cli.port);
    let mut stream = TcpStream::connect(&addr)?;

    let request = Piece::Array(
        cli.command
            .iter()
            .map(|word| Piece::bulk(Bytes::from(word.clone())))
            .collect(),
    );
    stream.write_all(&request.serialize())?;

    let mut reader = BufReader::new(stream);
    let reply = read_reply(&mut reader)?;
    print_reply(&reply);
    Ok(())
}

/// A reply read back from the wire. Distinct from [`Piece`] because a
/// `SimpleString`/`Error` carry borrowed framing semantics on the write
/// side that the read side doesn't need to mirror exactly — this just
/// needs enough structure to print.
enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Bytes>),
    Array(Vec<Reply>),
}

fn read_reply(reader: &mut BufReader<TcpStream>) -> io::Result<Reply> {
    let line = read_line(reader)?;
    let (tag, rest) = line.split_at(1);
    match tag.as_bytes()[0] {
        b'+' => Ok(Reply::Simple(rest.to_string())),
        b'-' => Ok(Reply::Error(rest.to_string())),
        b':' => {
            let n = rest
                .parse::<i64>()
                .map_err(|_| invalid_data("malformed integer reply"))?;
            Ok(Reply::Integer(n))
        }
        b'$' => {
            let len = rest
                .parse::<i64>()
                .map_err(|_| invalid_data("malformed bulk length"))?;
            if len < 0 {
                return Ok(Reply::Bulk(None));
            }
            let mut buf = BytesMut::zeroed(len as usize + 2);
            reader.read_exact(&mut buf)?;
            buf.truncate(len as usize);
            Ok(Reply::Bulk(Some(buf.freeze())))
        }
        b'*' => {
            let len = rest
                .parse::<i64>()
                .map_err(|_| invalid_data("malformed array length"))?;
            if len < 0 {
                return Ok(Reply::Array(Vec::new()));
            }
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(read_reply(reader)?);
            }
            Ok(Reply::Array(items))
        }
        other => Err(invalid_data(&format!("unexpected reply tag '{}'", other as char))),
    }
}

fn read_line(reader: &mut BufReader<TcpStream>) -> io::Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(invalid_data("connection closed before a full reply arrived"));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

fn invalid_data(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn print_reply(reply: &Reply) {
    match reply {
        Reply::Simple(s) => println!("{s}"),
        Reply::Error(s) => println!("(error) {s}"),
        Reply::Integer(n) => println!("(integer) {n}"),
        Reply::Bulk(None) => println!("(nil)"),
        Reply::Bulk(Some(b)) => match std::str::from_utf8(b) {
            Ok(s) => println!("\"{s}\""),
            Err(_) => println!("{b:?}"),
        },
        Reply::Array(items) => {
            if items.is_empty() {
                println!("(empty array)");
                return;
            }
            for (i, item) in items.iter().enumerate() {
                print!("{}) ", i + 1);
                print_reply(item);
            }
        }
    }
}
