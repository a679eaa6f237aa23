// Hash command handlers

use super::dispatcher::{CommandDispatcher, ConnContext, HandlerFlow};
use super::{blobs_reply, to_f64, to_i64, values_reply, MSG_NOT_FLOAT, MSG_NOT_INTEGER, MSG_WRONG_TYPE};
use crate::protocol::Reply;
use bytes::Bytes;

/// HSET key field value; replies 1 only when the field is newly created.
pub(crate) fn hset(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().hset(&ctx.current_db, &args[0], &args[1], &args[2]) {
        Ok(created) => Reply::integer(created as i64),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn hsetnx(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().hset_nx(&ctx.current_db, &args[0], &args[1], &args[2]) {
        Ok(ret) => Reply::integer(ret),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn hget(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().hget(&ctx.current_db, &args[0], &args[1]) {
        Ok(value) => Reply::BulkString(value),
        Err(_) => Reply::Nil,
    };
    HandlerFlow::Continue
}

/// HMSET key field value [field value ...]
pub(crate) fn hmset(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    if (args.len() - 1) % 2 != 0 {
        ctx.reply = Reply::error("ERR wrong number of arguments for HMSet");
        return HandlerFlow::Continue;
    }
    let pairs: Vec<(Bytes, Bytes)> = args[1..]
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    ctx.reply = match d.store().hmset(&ctx.current_db, &args[0], &pairs) {
        Ok(()) => Reply::status("OK"),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn hmget(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().hmget(&ctx.current_db, &args[0], &args[1..]) {
        Ok(values) => values_reply(values),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

/// HGETALL key; the reply alternates field then value.
pub(crate) fn hgetall(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().hgetall(&ctx.current_db, &args[0]) {
        Ok(entries) => {
            let mut elements = Vec::with_capacity(entries.len() * 2);
            for (field, value) in entries {
                elements.push(Reply::BulkString(field));
                elements.push(Reply::from(value));
            }
            Reply::Array(elements)
        }
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn hkeys(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().hkeys(&ctx.current_db, &args[0]) {
        Ok(fields) => blobs_reply(fields),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn hvals(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().hvals(&ctx.current_db, &args[0]) {
        Ok(values) => blobs_reply(values),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn hlen(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().hlen(&ctx.current_db, &args[0]) {
        Ok(len) => Reply::integer(len),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn hexists(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().hexists(&ctx.current_db, &args[0], &args[1]) {
        Ok(ret) => Reply::integer(ret),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn hdel(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().hdel(&ctx.current_db, &args[0], &args[1..]) {
        Ok(removed) => Reply::integer(removed),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn hincrby(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let Some(delta) = to_i64(&args[2]) else {
        ctx.reply = Reply::error(MSG_NOT_INTEGER);
        return HandlerFlow::Continue;
    };
    ctx.reply = match d.store().hincr_by(&ctx.current_db, &args[0], &args[1], delta) {
        Ok(value) => Reply::integer(value),
        Err(_) => Reply::error(MSG_NOT_INTEGER),
    };
    HandlerFlow::Continue
}

pub(crate) fn hincrbyfloat(
    d: &CommandDispatcher,
    ctx: &mut ConnContext,
    args: &[Bytes],
) -> HandlerFlow {
    let Some(delta) = to_f64(&args[2]) else {
        ctx.reply = Reply::error(MSG_NOT_FLOAT);
        return HandlerFlow::Continue;
    };
    ctx.reply = match d
        .store()
        .hincr_by_float(&ctx.current_db, &args[0], &args[1], delta)
    {
        Ok(value) => Reply::double(value),
        Err(_) => Reply::error(MSG_NOT_FLOAT),
    };
    HandlerFlow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{dispatcher, run};

    #[test]
    fn test_hset_reports_new_fields_only() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();

        assert_eq!(run(&d, &mut ctx, &["hset", "h", "f", "v1"]), Reply::integer(1));
        assert_eq!(run(&d, &mut ctx, &["hset", "h", "f", "v2"]), Reply::integer(0));
        assert_eq!(run(&d, &mut ctx, &["hget", "h", "f"]), Reply::bulk("v2"));
        assert_eq!(run(&d, &mut ctx, &["hget", "h", "nope"]), Reply::Nil);
    }

    #[test]
    fn test_hgetall_alternates_fields_and_values() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();

        run(&d, &mut ctx, &["hset", "h", "f1", "v1"]);
        run(&d, &mut ctx, &["hset", "h", "f2", "v2"]);
        assert_eq!(
            run(&d, &mut ctx, &["hgetall", "h"]),
            Reply::Array(vec![
                Reply::bulk("f1"),
                Reply::bulk("v1"),
                Reply::bulk("f2"),
                Reply::bulk("v2"),
            ])
        );
        assert_eq!(run(&d, &mut ctx, &["hgetall", "missing"]), Reply::Array(vec![]));
    }

    #[test]
    fn test_hmset_parity() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();

        assert_eq!(
            run(&d, &mut ctx, &["hmset", "h", "f1", "v1", "f2"]),
            Reply::error("ERR wrong number of arguments for HMSet")
        );
        assert_eq!(
            run(&d, &mut ctx, &["hmset", "h", "f1", "v1", "f2", "v2"]),
            Reply::status("OK")
        );
        assert_eq!(
            run(&d, &mut ctx, &["hmget", "h", "f1", "nope", "f2"]),
            Reply::Array(vec![Reply::bulk("v1"), Reply::Nil, Reply::bulk("v2")])
        );
    }

    #[test]
    fn test_hkeys_hvals_hlen() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();

        run(&d, &mut ctx, &["hmset", "h", "b", "2", "a", "1"]);
        assert_eq!(
            run(&d, &mut ctx, &["hkeys", "h"]),
            Reply::Array(vec![Reply::bulk("a"), Reply::bulk("b")])
        );
        assert_eq!(
            run(&d, &mut ctx, &["hvals", "h"]),
            Reply::Array(vec![Reply::bulk("1"), Reply::bulk("2")])
        );
        assert_eq!(run(&d, &mut ctx, &["hlen", "h"]), Reply::integer(2));
        assert_eq!(run(&d, &mut ctx, &["hlen", "missing"]), Reply::integer(0));
    }

    #[test]
    fn test_hdel_hexists_hsetnx() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();

        run(&d, &mut ctx, &["hmset", "h", "f1", "v1", "f2", "v2"]);
        assert_eq!(run(&d, &mut ctx, &["hexists", "h", "f1"]), Reply::integer(1));
        assert_eq!(run(&d, &mut ctx, &["hexists", "h", "zz"]), Reply::integer(0));

        assert_eq!(run(&d, &mut ctx, &["hsetnx", "h", "f1", "x"]), Reply::integer(0));
        assert_eq!(run(&d, &mut ctx, &["hsetnx", "h", "f3", "x"]), Reply::integer(1));

        assert_eq!(
            run(&d, &mut ctx, &["hdel", "h", "f1", "f2", "zz"]),
            Reply::integer(2)
        );
    }

    #[test]
    fn test_hash_counters() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();

        assert_eq!(run(&d, &mut ctx, &["hincrby", "h", "n", "5"]), Reply::integer(5));
        assert_eq!(run(&d, &mut ctx, &["hincrby", "h", "n", "-2"]), Reply::integer(3));
        assert_eq!(
            run(&d, &mut ctx, &["hincrby", "h", "n", "x"]),
            Reply::error(MSG_NOT_INTEGER)
        );
        assert_eq!(
            run(&d, &mut ctx, &["hincrbyfloat", "h", "f", "0.5"]),
            Reply::double(0.5)
        );
        assert_eq!(
            run(&d, &mut ctx, &["hincrbyfloat", "h", "f", "x"]),
            Reply::error(MSG_NOT_FLOAT)
        );
    }

    #[test]
    fn test_wrong_type() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();
        run(&d, &mut ctx, &["set", "s", "v"]);
        assert_eq!(
            run(&d, &mut ctx, &["hset", "s", "f", "v"]),
            Reply::error(MSG_WRONG_TYPE)
        );
        assert_eq!(
            run(&d, &mut ctx, &["hgetall", "s"]),
            Reply::error(MSG_WRONG_TYPE)
        );
    }
}
