// Command dispatcher - handler table and per-frame lifecycle

use super::{bitmap, hash, key, server_cmds, set, string, zset};
use crate::protocol::{CommandFrame, Reply};
use crate::storage::Store;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::error;

/// Per-connection state. Created on accept, destroyed on close, mutated only
/// by the owning connection task.
pub struct ConnContext {
    /// Identifier of the selected database; SELECT replaces it.
    pub current_db: Bytes,
    /// Reply slot, cleared at the start of every command.
    pub reply: Reply,
}

impl ConnContext {
    pub fn new() -> Self {
        Self {
            current_db: Bytes::from_static(b"0"),
            reply: Reply::Unset,
        }
    }
}

impl Default for ConnContext {
    fn default() -> Self {
        Self::new()
    }
}

/// What the connection should do once the reply is flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerFlow {
    Continue,
    /// Close the connection after the pending reply is written (QUIT, SHUTDOWN).
    Close,
}

pub type CommandHandler = fn(&CommandDispatcher, &mut ConnContext, &[Bytes]) -> HandlerFlow;

/// One handler table entry. Arity bounds exclude the command name itself;
/// -1 means unbounded.
pub struct CommandSetting {
    pub handler: CommandHandler,
    pub min_arity: i32,
    pub max_arity: i32,
}

/// Routes decoded frames to handlers. The table is immutable after
/// construction and shared across all connections.
pub struct CommandDispatcher {
    store: Arc<dyn Store>,
    shutdown: Arc<Notify>,
    table: HashMap<&'static str, CommandSetting>,
}

impl CommandDispatcher {
    pub fn new(store: Arc<dyn Store>, shutdown: Arc<Notify>) -> Self {
        let entries: &[(&'static str, CommandHandler, i32, i32)] = &[
            ("ping", server_cmds::ping, 0, 0),
            ("echo", server_cmds::echo, 1, 1),
            ("quit", server_cmds::quit, 0, 0),
            ("shutdown", server_cmds::shutdown, 0, 1),
            ("slaveof", server_cmds::slaveof, 2, 2),
            ("select", server_cmds::select, 1, 1),
            ("append", string::append, 2, 2),
            ("get", string::get, 1, 1),
            ("set", string::set, 2, 7),
            ("del", key::del, 1, -1),
            ("exists", key::exists, 1, 1),
            ("expire", key::expire, 2, 2),
            ("expireat", key::expireat, 2, 2),
            ("persist", key::persist, 1, 1),
            ("type", key::key_type, 1, 1),
            ("bitcount", bitmap::bitcount, 1, 3),
            ("bitop", bitmap::bitop, 3, -1),
            ("decr", string::decr, 1, 1),
            ("decrby", string::decrby, 2, 2),
            ("getbit", bitmap::getbit, 2, 2),
            ("getrange", string::getrange, 3, 3),
            ("getset", string::getset, 2, 2),
            ("incr", string::incr, 1, 1),
            ("incrby", string::incrby, 2, 2),
            ("incrbyfloat", string::incrbyfloat, 2, 2),
            ("mget", string::mget, 1, -1),
            ("mset", string::mset, 2, -1),
            ("msetnx", string::msetnx, 2, -1),
            ("psetex", string::psetex, 3, 3),
            ("setbit", bitmap::setbit, 3, 3),
            ("setex", string::setex, 3, 3),
            ("setnx", string::setnx, 2, 2),
            ("setrange", string::setrange, 3, 3),
            ("strlen", string::strlen, 1, 1),
            ("hdel", hash::hdel, 2, -1),
            ("hexists", hash::hexists, 2, 2),
            ("hget", hash::hget, 2, 2),
            ("hgetall", hash::hgetall, 1, 1),
            ("hincrby", hash::hincrby, 3, 3),
            ("hincrbyfloat", hash::hincrbyfloat, 3, 3),
            ("hkeys", hash::hkeys, 1, 1),
            ("hlen", hash::hlen, 1, 1),
            ("hvals", hash::hvals, 1, 1),
            ("hmget", hash::hmget, 2, -1),
            ("hset", hash::hset, 3, 3),
            ("hsetnx", hash::hsetnx, 3, 3),
            ("hmset", hash::hmset, 3, -1),
            ("scard", set::scard, 1, 1),
            ("sadd", set::sadd, 2, -1),
            ("sdiff", set::sdiff, 2, -1),
            ("sdiffstore", set::sdiffstore, 3, -1),
            ("sinter", set::sinter, 2, -1),
            ("sinterstore", set::sinterstore, 3, -1),
            ("sismember", set::sismember, 2, 2),
            ("smembers", set::smembers, 1, 1),
            ("smove", set::smove, 3, 3),
            ("spop", set::spop, 1, 1),
            ("srandmember", set::srandmember, 1, 2),
            ("srem", set::srem, 2, -1),
            ("sunion", set::sunion, 2, -1),
            ("sunionstore", set::sunionstore, 3, -1),
            ("zadd", zset::zadd, 3, -1),
            ("zcard", zset::zcard, 1, 1),
            ("zcount", zset::zcount, 3, 3),
            ("zincrby", zset::zincrby, 3, 3),
            ("zrange", zset::zrange, 3, 4),
            ("zscore", zset::zscore, 2, 2),
        ];

        let mut table = HashMap::with_capacity(entries.len());
        for &(name, handler, min_arity, max_arity) in entries {
            table.insert(
                name,
                CommandSetting {
                    handler,
                    min_arity,
                    max_arity,
                },
            );
        }

        Self {
            store,
            shutdown,
            table,
        }
    }

    pub fn store(&self) -> &dyn Store {
        &*self.store
    }

    /// Ask the accept loop to stop; raised by the SHUTDOWN handler.
    pub fn request_shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    /// Run one frame through the lookup/validate/invoke lifecycle.
    ///
    /// The reply slot is cleared first; if it is still unset when the handler
    /// returns, the connection writes nothing for this frame.
    pub fn dispatch(&self, ctx: &mut ConnContext, frame: CommandFrame) -> HandlerFlow {
        ctx.reply.clear();

        let Some(name_raw) = frame.args.first() else {
            return HandlerFlow::Continue;
        };
        let name = String::from_utf8_lossy(name_raw).to_lowercase();

        let Some(setting) = self.table.get(name.as_str()) else {
            error!("no handler found for: {}", name);
            ctx.reply = Reply::error(format!("ERR unknown command '{name}'"));
            return HandlerFlow::Continue;
        };

        let args = &frame.args[1..];
        let mut valid = true;
        if setting.min_arity >= 0 {
            valid = args.len() >= setting.min_arity as usize;
        }
        if valid && setting.max_arity >= 0 {
            valid = args.len() <= setting.max_arity as usize;
        }
        if !valid {
            ctx.reply = Reply::error(format!(
                "ERR wrong number of arguments for '{name}' command"
            ));
            return HandlerFlow::Continue;
        }

        (setting.handler)(self, ctx, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{dispatcher, frame, run};

    #[test]
    fn test_unknown_command() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();
        let reply = run(&d, &mut ctx, &["nosuchcmd", "x"]);
        assert_eq!(reply, Reply::error("ERR unknown command 'nosuchcmd'"));
    }

    #[test]
    fn test_arity_bounds() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();

        let reply = run(&d, &mut ctx, &["get"]);
        assert_eq!(
            reply,
            Reply::error("ERR wrong number of arguments for 'get' command")
        );

        let reply = run(&d, &mut ctx, &["get", "a", "b"]);
        assert_eq!(
            reply,
            Reply::error("ERR wrong number of arguments for 'get' command")
        );

        // Unbounded max accepts any tail
        let reply = run(&d, &mut ctx, &["del", "a", "b", "c", "d", "e"]);
        assert_eq!(reply, Reply::integer(0));
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();
        assert_eq!(run(&d, &mut ctx, &["PING"]), Reply::status("PONG"));
        assert_eq!(run(&d, &mut ctx, &["PiNg"]), Reply::status("PONG"));
        assert_eq!(run(&d, &mut ctx, &["ping"]), Reply::status("PONG"));
    }

    #[test]
    fn test_reply_slot_cleared_between_frames() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();
        assert_eq!(run(&d, &mut ctx, &["ping"]), Reply::status("PONG"));
        // slaveof is accepted but produces no reply
        assert_eq!(run(&d, &mut ctx, &["slaveof", "host", "6379"]), Reply::Unset);
    }

    #[test]
    fn test_empty_frame_is_ignored() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();
        let flow = d.dispatch(&mut ctx, frame(&[]));
        assert_eq!(flow, HandlerFlow::Continue);
        assert!(ctx.reply.is_unset());
    }

    #[test]
    fn test_quit_closes_after_reply() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();
        let flow = d.dispatch(&mut ctx, frame(&["quit"]));
        assert_eq!(flow, HandlerFlow::Close);
        assert_eq!(ctx.reply, Reply::status("OK"));
    }

    #[test]
    fn test_select_switches_database() {
        let d = dispatcher();
        let mut ctx = ConnContext::new();

        assert_eq!(run(&d, &mut ctx, &["set", "k", "zero"]), Reply::status("OK"));
        assert_eq!(run(&d, &mut ctx, &["select", "1"]), Reply::status("OK"));
        assert_eq!(run(&d, &mut ctx, &["get", "k"]), Reply::Nil);
        assert_eq!(run(&d, &mut ctx, &["select", "0"]), Reply::status("OK"));
        assert_eq!(run(&d, &mut ctx, &["get", "k"]), Reply::bulk("zero"));
    }
}
