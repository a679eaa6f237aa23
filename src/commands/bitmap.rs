// Bit command handlers

use super::dispatcher::{CommandDispatcher, ConnContext, HandlerFlow};
use super::{to_i32, MSG_NOT_BIT, MSG_NOT_INTEGER, MSG_SYNTAX, MSG_WRONG_TYPE};
use crate::protocol::Reply;
use crate::storage::{BitOp, StoreError};
use bytes::Bytes;

pub(crate) fn getbit(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let Some(offset) = to_i32(&args[1]) else {
        ctx.reply = Reply::error(MSG_NOT_INTEGER);
        return HandlerFlow::Continue;
    };
    ctx.reply = match d.store().get_bit(&ctx.current_db, &args[0], offset) {
        Ok(bit) => Reply::integer(bit),
        Err(StoreError::WrongType) => Reply::error(MSG_WRONG_TYPE),
        Err(_) => Reply::error(MSG_NOT_INTEGER),
    };
    HandlerFlow::Continue
}

/// SETBIT key offset value; replies with the previous bit.
pub(crate) fn setbit(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let Some(offset) = to_i32(&args[1]) else {
        ctx.reply = Reply::error(MSG_NOT_INTEGER);
        return HandlerFlow::Continue;
    };
    let bit = match &args[2][..] {
        b"0" => false,
        b"1" => true,
        _ => {
            ctx.reply = Reply::error(MSG_NOT_BIT);
            return HandlerFlow::Continue;
        }
    };
    ctx.reply = match d.store().set_bit(&ctx.current_db, &args[0], offset, bit) {
        Ok(old) => Reply::integer(old),
        Err(StoreError::WrongType) => Reply::error(MSG_WRONG_TYPE),
        Err(_) => Reply::error(MSG_NOT_INTEGER),
    };
    HandlerFlow::Continue
}

/// BITCOUNT key [start end]; one range endpoint alone is a syntax error.
pub(crate) fn bitcount(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    if args.len() == 2 {
        ctx.reply = Reply::error(MSG_SYNTAX);
        return HandlerFlow::Continue;
    }

    let (start, end) = if args.len() == 1 {
        (0, -1)
    } else {
        let (Some(start), Some(end)) = (to_i32(&args[1]), to_i32(&args[2])) else {
            ctx.reply = Reply::error(MSG_NOT_INTEGER);
            return HandlerFlow::Continue;
        };
        (start, end)
    };

    ctx.reply = match d.store().bit_count(&ctx.current_db, &args[0], start, end) {
        Ok(count) => Reply::integer(count),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}

/// BITOP AND|OR|XOR|NOT dest src [src ...]
pub(crate) fn bitop(d: &CommandDispatcher, ctx: &mut ConnContext, args: &[Bytes]) -> HandlerFlow {
    let Some(op) = BitOp::parse(&args[0]) else {
        ctx.reply = Reply::error(MSG_SYNTAX);
        return HandlerFlow::Continue;
    };
    if op == BitOp::Not && args.len() != 3 {
        ctx.reply = Reply::error(MSG_SYNTAX);
        return HandlerFlow::Continue;
    }
    ctx.reply = match d.store().bit_op(&ctx.current_db, op, &args[1], &args[2..]) {
        Ok(len) => Reply::integer(len),
        Err(_) => Reply::error(MSG_WRONG_TYPE),
    };
    HandlerFlow::Continue
}
