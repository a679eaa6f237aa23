// Set command handlers

use super::dispatcher::{CommandDispatcher, ConnContext, HandlerFlow};
use super::{to_i32, values_reply, MSG_NOT_INTEGER, MSG_WRONG_TYPE};
use crate::protocol::Reply;
use crate::storage::StoreError;
use bytes::Bytes;

pub(crate) fn sadd(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().sadd(&ctx.current_db, &args[0], &args[1..]) {
        Ok(added) => Reply::integer(added),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn scard(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().scard(&ctx.current_db, &args[0]) {
        Ok(card) => Reply::integer(card.max(0)),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn sismember(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().sis_member(&ctx.current_db, &args[0], &args[1]) {
        Ok(ret) => Reply::integer(ret),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn smembers(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().smembers(&ctx.current_db, &args[0]) {
        Ok(members) => values_reply(members),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn smove(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().smove(&ctx.current_db, &args[0], &args[1], &args[2]) {
        Ok(ret) => Reply::integer(ret),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn spop(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().spop(&ctx.current_db, &args[0]) {
        Ok(member) => Reply::BulkString(member),
        Err(StoreError::WrongType) => Reply::error(MSG_WRONG_TYPE),
        Err(_) => Reply::Nil,
    };
    HandlerFlow::Continue
}

/// SRANDMEMBER key [count]
pub(crate) fn srandmember(
    d: &CommandDispatcher,
    ctx: &mut ConnContext,
    args: &[Bytes],
) -> HandlerFlow {
    let mut count = 1;
    if args.len() > 1 {
        match to_i32(&args[1]) {
            Some(c) => count = c,
            None => {
                ctx.reply = Reply::error(MSG_NOT_INTEGER);
                return HandlerFlow::Continue;
            }
        }
    }
    ctx.reply = match d.store().srand_member(&ctx.current_db, &args[0], count) {
        Ok(members) => values_reply(members),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn srem(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().srem(&ctx.current_db, &args[0], &args[1..]) {
        Ok(removed) => Reply::integer(removed),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn sdiff(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().sdiff(&ctx.current_db, args) {
        Ok(members) => values_reply(members),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn sdiffstore(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().sdiff_store(&ctx.current_db, &args[0], &args[1..]) {
        Ok(card) => Reply::integer(card),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn sinter(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().sinter(&ctx.current_db, args) {
        Ok(members) => values_reply(members),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn sinterstore(
    d: &CommandDispatcher,
    ctx: &mut ConnContext,
    args: &[Bytes],
) -> HandlerFlow {
    ctx.reply = match d.store().sinter_store(&ctx.current_db, &args[0], &args[1..]) {
        Ok(card) => Reply::integer(card),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn sunion(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    ctx.reply = match d.store().sunion(&ctx.current_db, args) {
        Ok(members) => values_reply(members),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

pub(crate) fn sunionstore(
    d: &CommandDispatcher,
    ctx: &mut ConnContext,
    args: &[Bytes],
) -> HandlerFlow {
    ctx.reply = match d.store().sunion_store(&ctx.current_db, &args[0], &args[1..]) {
        Ok(card) => Reply::integer(card),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{dispatcher, run};

    #[test]
    fn test_sadd_scard_sismember() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();

        assert_eq!(run(&d, &mut ctx, &["sadd", "s", "a", "b", "c"]), Reply::integer(3));
        assert_eq!(run(&d, &mut ctx, &["sadd", "s", "a"]), Reply::integer(0));
        assert_eq!(run(&d, &mut ctx, &["scard", "s"]), Reply::integer(3));
        assert_eq!(run(&d, &mut ctx, &["scard", "missing"]), Reply::integer(0));
        assert_eq!(run(&d, &mut ctx, &["sismember", "s", "b"]), Reply::integer(1));
        assert_eq!(run(&d, &mut ctx, &["sismember", "s", "z"]), Reply::integer(0));
    }

    #[test]
    fn test_smembers_sorted() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();
        run(&d, &mut ctx, &["sadd", "s", "c", "a", "b"]);
        assert_eq!(
            run(&d, &mut ctx, &["smembers", "s"]),
            Reply::Array(vec![Reply::bulk("a"), Reply::bulk("b"), Reply::bulk("c")])
        );
    }

    #[test]
    fn test_srem_spop() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();
        run(&d, &mut ctx, &["sadd", "s", "a", "b"]);

        assert_eq!(run(&d, &mut ctx, &["srem", "s", "a", "z"]), Reply::integer(1));
        assert_eq!(run(&d, &mut ctx, &["spop", "s"]), Reply::bulk("b"));
        assert_eq!(run(&d, &mut ctx, &["spop", "s"]), Reply::Nil);
    }

    #[test]
    fn test_srandmember() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();
        run(&d, &mut ctx, &["sadd", "s", "a", "b", "c"]);

        match run(&d, &mut ctx, &["srandmember", "s"]) {
            Reply::Array(members) => assert_eq!(members.len(), 1),
            other => panic!("expected array, got {other:?}"),
        }
        match run(&d, &mut ctx, &["srandmember", "s", "2"]) {
            Reply::Array(members) => assert_eq!(members.len(), 2),
            other => panic!("expected array, got {other:?}"),
        }
        assert_eq!(
            run(&d, &mut ctx, &["srandmember", "s", "x"]),
            Reply::error(MSG_NOT_INTEGER)
        );
    }

    #[test]
    fn test_smove() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();
        run(&d, &mut ctx, &["sadd", "src", "a", "b"]);

        assert_eq!(run(&d, &mut ctx, &["smove", "src", "dst", "a"]), Reply::integer(1));
        assert_eq!(run(&d, &mut ctx, &["smove", "src", "dst", "z"]), Reply::integer(0));
        assert_eq!(run(&d, &mut ctx, &["sismember", "dst", "a"]), Reply::integer(1));
    }

    #[test]
    fn test_set_algebra() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();
        run(&d, &mut ctx, &["sadd", "a", "1", "2", "3"]);
        run(&d, &mut ctx, &["sadd", "b", "2", "3", "4"]);

        assert_eq!(
            run(&d, &mut ctx, &["sdiff", "a", "b"]),
            Reply::Array(vec![Reply::bulk("1")])
        );
        assert_eq!(
            run(&d, &mut ctx, &["sinter", "a", "b"]),
            Reply::Array(vec![Reply::bulk("2"), Reply::bulk("3")])
        );
        assert_eq!(
            run(&d, &mut ctx, &["sunion", "a", "b"]),
            Reply::Array(vec![
                Reply::bulk("1"),
                Reply::bulk("2"),
                Reply::bulk("3"),
                Reply::bulk("4"),
            ])
        );

        assert_eq!(
            run(&d, &mut ctx, &["sinterstore", "dst", "a", "b"]),
            Reply::integer(2)
        );
        assert_eq!(run(&d, &mut ctx, &["scard", "dst"]), Reply::integer(2));
        assert_eq!(
            run(&d, &mut ctx, &["sunionstore", "dst", "a", "b"]),
            Reply::integer(4)
        );
        assert_eq!(
            run(&d, &mut ctx, &["sdiffstore", "dst", "a", "b"]),
            Reply::integer(1)
        );
    }

    #[test]
    fn test_wrong_type() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();
        run(&d, &mut ctx, &["set", "k", "v"]);
        assert_eq!(
            run(&d, &mut ctx, &["sadd", "k", "a"]),
            Reply::error(MSG_WRONG_TYPE)
        );
        assert_eq!(
            run(&d, &mut ctx, &["smembers", "k"]),
            Reply::error(MSG_WRONG_TYPE)
        );
    }
}
