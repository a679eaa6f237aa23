// Keyspace command handlers

use super::dispatcher::{CommandDispatcher, ConnContext, HandlerFlow};
use super::{to_i64, MSG_NOT_INTEGER};
use crate::protocol::Reply;
use crate::storage::now_ms;
use bytes::Bytes;

/// DEL key [key ...]; replies with the number of keys actually removed.
pub(crate) fn del(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let removed = d.store().del(&ctx.current_db, args);
    ctx.reply = Reply::integer(removed);
    HandlerFlow::Continue
}

pub(crate) fn exists(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let present = d.store().exists(&ctx.current_db, &args[0]);
    ctx.reply = Reply::integer(present as i64);
    HandlerFlow::Continue
}

/// EXPIRE key seconds
pub(crate) fn expire(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let Some(secs) = to_i64(&args[1]) else {
        ctx.reply = Reply::error(MSG_NOT_INTEGER);
        return HandlerFlow::Continue;
    };
    let at_ms = now_ms().saturating_add_signed(secs.saturating_mul(1000));
    let applied = d.store().expire_at(&ctx.current_db, &args[0], at_ms);
    ctx.reply = Reply::integer(applied as i64);
    HandlerFlow::Continue
}

/// EXPIREAT key unix-seconds
pub(crate) fn expireat(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let Some(at_secs) = to_i64(&args[1]) else {
        ctx.reply = Reply::error(MSG_NOT_INTEGER);
        return HandlerFlow::Continue;
    };
    let at_ms = at_secs.saturating_mul(1000).max(0) as u64;
    let applied = d.store().expire_at(&ctx.current_db, &args[0], at_ms);
    ctx.reply = Reply::integer(applied as i64);
    HandlerFlow::Continue
}

pub(crate) fn persist(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let removed = d.store().persist(&ctx.current_db, &args[0]);
    ctx.reply = Reply::integer(removed as i64);
    HandlerFlow::Continue
}

/// TYPE key
pub(crate) fn key_type(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let kind = d.store().key_type(&ctx.current_db, &args[0]);
    ctx.reply = Reply::status(kind.type_name());
    HandlerFlow::Continue
}
