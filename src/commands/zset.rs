// Sorted set command handlers

use super::dispatcher::{CommandDispatcher, ConnContext, HandlerFlow};
use super::{lowercase, to_f64, to_i32, values_reply, MSG_NOT_FLOAT, MSG_NOT_INTEGER, MSG_SYNTAX, MSG_WRONG_TYPE};
use crate::protocol::Reply;
use crate::storage::StoreError;
use bytes::Bytes;

/// ZADD key score member [score member ...]
///
/// The whole batch goes through one multi/exec bracket; the first bad score
/// discards everything staged so far.
pub(crate) fn zadd(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    if (args.len() - 1) % 2 != 0 {
        ctx.reply = Reply::error("ERR wrong number of arguments for ZAdd");
        return HandlerFlow::Continue;
    }

    let key = &args[0];
    let db = ctx.current_db.clone();
    d.store().multi(&db);
    let mut added = 0;
    for pair in args[1..].chunks_exact(2) {
        let Some(score) = to_f64(&pair[0]) else {
            ctx.reply = Reply::error(MSG_NOT_FLOAT);
            d.store().discard(&db);
            return HandlerFlow::Continue;
        };
        match d.store().zadd(&db, key, score, &pair[1]) {
            Ok(true) => added += 1,
            Ok(false) => {}
            Err(_) => {
                ctx.reply = Reply::error(MSG_WRONG_TYPE);
                d.store().discard(&db);
                return HandlerFlow::Continue;
            }
        }
    }
    d.store().exec(&db);

    ctx.reply = Reply::integer(added);
    HandlerFlow::Continue
}

pub(crate) fn zcard(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().zcard(&ctx.current_db, &args[0]) {
        Ok(card) => Reply::integer(card),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

/// ZCOUNT key min max; bounds are parsed by the store (`-inf`, `(x`, floats).
pub(crate) fn zcount(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().zcount(&ctx.current_db, &args[0], &args[1], &args[2]) {
        Ok(count) => Reply::integer(count),
        Err(StoreError::WrongType) => Reply::error(MSG_WRONG_TYPE),
        Err(_) => Reply::error(MSG_NOT_FLOAT),
    };
    HandlerFlow::Continue
}

pub(crate) fn zincrby(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let Some(delta) = to_f64(&args[1]) else {
        ctx.reply = Reply::error(MSG_NOT_FLOAT);
        return HandlerFlow::Continue;
    };
    ctx.reply = match d.store().zincr_by(&ctx.current_db, &args[0], delta, &args[2]) {
        Ok(score) => Reply::double(score),
        Err(StoreError::WrongType) => Reply::error(MSG_WRONG_TYPE),
        Err(_) => Reply::error(MSG_NOT_FLOAT),
    };
    HandlerFlow::Continue
}

/// ZRANGE key start stop [WITHSCORES]
pub(crate) fn zrange(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let mut with_scores = false;
    if args.len() == 4 {
        if lowercase(&args[3]) != "withscores" {
            ctx.reply = Reply::error(MSG_SYNTAX);
            return HandlerFlow::Continue;
        }
        with_scores = true;
    }
    let (Some(start), Some(stop)) = (to_i32(&args[1]), to_i32(&args[2])) else {
        ctx.reply = Reply::error(MSG_NOT_INTEGER);
        return HandlerFlow::Continue;
    };
    ctx.reply = match d
        .store()
        .zrange(&ctx.current_db, &args[0], start, stop, with_scores)
    {
        Ok(values) => values_reply(values),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn zscore(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().zscore(&ctx.current_db, &args[0], &args[1]) {
        Ok(score) => Reply::double(score),
        Err(_) => Reply::Nil,
    };
    HandlerFlow::Continue
}
