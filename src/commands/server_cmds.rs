// Server command handlers

use super::dispatcher::{CommandDispatcher, ConnContext, HandlerFlow};
use crate::protocol::Reply;
use bytes::Bytes;
use tracing::debug;

pub(crate) fn ping(_d: &CommandDispatcher, ctx: &mut ConnContext, _args: &[Bytes]) -> HandlerFlow {
    ctx.reply = Reply::status("PONG");
    HandlerFlow::Continue
}

pub(crate) fn echo(_d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = Reply::BulkString(args[0].clone());
    HandlerFlow::Continue
}

/// SELECT db; takes effect for the next command on this connection.
pub(crate) fn select(_d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.current_db = args[0].clone();
    ctx.reply = Reply::status("OK");
    debug!("select db is {}", String::from_utf8_lossy(&args[0]));
    HandlerFlow::Continue
}

pub(crate) fn quit(_d: &CommandDispatcher, ctx: &mut ConnContext, _args: &[Bytes]) -> HandlerFlow {
    ctx.reply = Reply::status("OK");
    HandlerFlow::Close
}

/// SHUTDOWN stops the accept loop and closes this connection; no reply.
pub(crate) fn shutdown(d: &CommandDispatcher, _ctx: &mut ConnContext, _args: &[Bytes]) -> HandlerFlow {
    d.request_shutdown();
    HandlerFlow::Close
}

/// Replication is handled outside this server; the command is accepted and
/// produces no reply.
pub(crate) fn slaveof(_d: &CommandDispatcher, _ctx: &mut ConnContext, _args: &[Bytes]) -> HandlerFlow {
    HandlerFlow::Continue
}
