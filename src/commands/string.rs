// String command handlers

use super::dispatcher::{CommandDispatcher, ConnContext, HandlerFlow};
use super::{
    lowercase, to_f64, to_i32, to_i64, to_u32, values_reply, MSG_NOT_FLOAT, MSG_NOT_INTEGER,
    MSG_SYNTAX, MSG_WRONG_TYPE,
};
use crate::protocol::Reply;
use crate::storage::{SetCondition, StoreError};
use bytes::Bytes;

/// SET key value [EX seconds] [PX milliseconds] [NX|XX]
///
/// EX/PX clauses come first, then at most one trailing NX or XX token.
/// Anything else in the tail is a syntax error.
pub(crate) fn set(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let key = &args[0];
    let value = &args[1];

    let applied = if args.len() == 2 {
        d.store().set(&ctx.current_db, key, value).is_ok()
    } else {
        let mut ex = 0u64;
        let mut px = 0u64;
        let mut i = 2;
        while i < args.len() {
            let token = lowercase(&args[i]);
            if token != "ex" && token != "px" {
                break;
            }
            if i + 1 >= args.len() {
                ctx.reply = Reply::error(MSG_SYNTAX);
                return HandlerFlow::Continue;
            }
            let Some(v) = to_i64(&args[i + 1]).filter(|v| *v >= 0) else {
                ctx.reply = Reply::error(MSG_NOT_INTEGER);
                return HandlerFlow::Continue;
            };
            if token == "px" {
                px = v as u64;
            } else {
                ex = v as u64;
            }
            i += 2;
        }

        let mut condition = SetCondition::Any;
        if i < args.len() {
            if i != args.len() - 1 {
                ctx.reply = Reply::error(MSG_SYNTAX);
                return HandlerFlow::Continue;
            }
            condition = match lowercase(&args[i]).as_str() {
                "nx" => SetCondition::IfAbsent,
                "xx" => SetCondition::IfPresent,
                _ => {
                    ctx.reply = Reply::error(MSG_SYNTAX);
                    return HandlerFlow::Continue;
                }
            };
        }

        d.store()
            .set_with_options(&ctx.current_db, key, value, ex, px, condition)
            .unwrap_or(false)
    };

    ctx.reply = if applied {
        Reply::status("OK")
    } else {
        Reply::Nil
    };
    HandlerFlow::Continue
}

pub(crate) fn get(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().get(&ctx.current_db, &args[0]) {
        Ok(value) => Reply::BulkString(value),
        Err(_) => Reply::Nil,
    };
    HandlerFlow::Continue
}

pub(crate) fn setex(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let Some(secs) = to_u32(&args[1]) else {
        ctx.reply = Reply::error(MSG_NOT_INTEGER);
        return HandlerFlow::Continue;
    };
    let _ = d.store().set_ex(&ctx.current_db, &args[0], &args[2], secs);
    ctx.reply = Reply::status("OK");
    HandlerFlow::Continue
}

pub(crate) fn psetex(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let Some(millis) = to_u32(&args[1]) else {
        ctx.reply = Reply::error(MSG_NOT_INTEGER);
        return HandlerFlow::Continue;
    };
    let _ = d
        .store()
        .pset_ex(&ctx.current_db, &args[0], &args[2], millis);
    ctx.reply = Reply::status("OK");
    HandlerFlow::Continue
}

pub(crate) fn setnx(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let ret = d.store().set_nx(&ctx.current_db, &args[0], &args[1]);
    ctx.reply = Reply::integer(ret);
    HandlerFlow::Continue
}

pub(crate) fn setrange(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let Some(offset) = to_i32(&args[1]) else {
        ctx.reply = Reply::error(MSG_NOT_INTEGER);
        return HandlerFlow::Continue;
    };
    ctx.reply = match d.store().set_range(&ctx.current_db, &args[0], offset, &args[2]) {
        Ok(len) => Reply::integer(len),
        Err(StoreError::WrongType) => Reply::error(MSG_WRONG_TYPE),
        Err(_) => Reply::error(MSG_NOT_INTEGER),
    };
    HandlerFlow::Continue
}

pub(crate) fn strlen(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().strlen(&ctx.current_db, &args[0]) {
        Ok(len) => Reply::integer(len),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn append(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let key = &args[0];
    ctx.reply = match d.store().append(&ctx.current_db, key, &args[1]) {
        Ok(len) => Reply::integer(len),
        Err(_) => Reply::error(format!(
            "ERR failed to append key:{}",
            String::from_utf8_lossy(key)
        )),
    };
    HandlerFlow::Continue
}

pub(crate) fn getrange(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let (Some(start), Some(end)) = (to_i32(&args[1]), to_i32(&args[2])) else {
        ctx.reply = Reply::error(MSG_NOT_INTEGER);
        return HandlerFlow::Continue;
    };
    ctx.reply = match d.store().get_range(&ctx.current_db, &args[0], start, end) {
        Ok(value) => Reply::BulkString(value),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn getset(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().get_set(&ctx.current_db, &args[0], &args[1]) {
        Ok(old) => Reply::BulkString(old),
        Err(StoreError::WrongType) => Reply::error(MSG_WRONG_TYPE),
        Err(_) => Reply::Nil,
    };
    HandlerFlow::Continue
}

pub(crate) fn mget(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = values_reply(d.store().mget(&ctx.current_db, args));
    HandlerFlow::Continue
}

fn collect_pairs(args: &[Bytes]) -> Vec<(Bytes, Bytes)> {
    args.chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

pub(crate) fn mset(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    if args.len() % 2 != 0 {
        ctx.reply = Reply::error("ERR wrong number of arguments for MSET");
        return HandlerFlow::Continue;
    }
    d.store().mset(&ctx.current_db, &collect_pairs(args));
    ctx.reply = Reply::status("OK");
    HandlerFlow::Continue
}

pub(crate) fn msetnx(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    if args.len() % 2 != 0 {
        ctx.reply = Reply::error("ERR wrong number of arguments for MSETNX");
        return HandlerFlow::Continue;
    }
    let ret = d.store().mset_nx(&ctx.current_db, &collect_pairs(args));
    ctx.reply = Reply::integer(ret);
    HandlerFlow::Continue
}

pub(crate) fn incr(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().incr(&ctx.current_db, &args[0]) {
        Ok(value) => Reply::integer(value),
        Err(_) => Reply::error(MSG_NOT_INTEGER),
    };
    HandlerFlow::Continue
}

pub(crate) fn decr(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().decr(&ctx.current_db, &args[0]) {
        Ok(value) => Reply::integer(value),
        Err(_) => Reply::error(MSG_NOT_INTEGER),
    };
    HandlerFlow::Continue
}

pub(crate) fn incrby(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let Some(delta) = to_i64(&args[1]) else {
        ctx.reply = Reply::error(MSG_NOT_INTEGER);
        return HandlerFlow::Continue;
    };
    ctx.reply = match d.store().incr_by(&ctx.current_db, &args[0], delta) {
        Ok(value) => Reply::integer(value),
        Err(_) => Reply::error(MSG_NOT_INTEGER),
    };
    HandlerFlow::Continue
}

pub(crate) fn decrby(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let Some(delta) = to_i64(&args[1]) else {
        ctx.reply = Reply::error(MSG_NOT_INTEGER);
        return HandlerFlow::Continue;
    };
    ctx.reply = match d.store().decr_by(&ctx.current_db, &args[0], delta) {
        Ok(value) => Reply::integer(value),
        Err(_) => Reply::error(MSG_NOT_INTEGER),
    };
    HandlerFlow::Continue
}

pub(crate) fn incrbyfloat(
    d: &CommandDispatcher,
    ctx: &mut ConnContext,
    args: &[Bytes],
) -> HandlerFlow {
    let Some(delta) = to_f64(&args[1]) else {
        ctx.reply = Reply::error(MSG_NOT_FLOAT);
        return HandlerFlow::Continue;
    };
    ctx.reply = match d.store().incr_by_float(&ctx.current_db, &args[0], delta) {
        Ok(value) => Reply::double(value),
        Err(_) => Reply::error(MSG_NOT_FLOAT),
    };
    HandlerFlow::Continue
}
