//! Command Handlers
//!
//! Every supported command belongs to one fixed family. The family
//! decides the arity check, which argument is hashed, and whether the
//! command is forwarded as-is or split into per-key sub-commands.
//!
//! | family        | commands                    | hash key            | reply          |
//! |---------------|-----------------------------|---------------------|----------------|
//! | `Simple`      | `GET`, `SET`, `HGET`, ...   | argument 1          | relayed        |
//! | `Eval`        | `EVAL`, `EVALSHA`           | argument 3          | relayed        |
//! | `Gather`      | `MGET`                      | each key            | array of GETs  |
//! | `Acknowledge` | `MSET`                      | each key            | `OK` or error  |
//! | `Sum`         | `DEL`, `EXISTS`, ...        | each key            | summed integer |

use super::aggregate::Aggregation;
use super::request::{start_fragmented, start_single, Fragment, SplitCallbacks, SplitRequest};
use crate::error::SplitError;
use crate::pool::ConnPool;
use crate::protocol::RespValue;
use crate::stats::{CommandStats, TimeSource};
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

/// Commands that hash their first argument and go to a single shard.
const SIMPLE_COMMANDS: &[&str] = &[
    "append",
    "bitcount",
    "bitfield",
    "bitpos",
    "decr",
    "decrby",
    "dump",
    "expire",
    "expireat",
    "geoadd",
    "geodist",
    "geohash",
    "geopos",
    "georadius_ro",
    "georadiusbymember_ro",
    "get",
    "getbit",
    "getrange",
    "getset",
    "hdel",
    "hexists",
    "hget",
    "hgetall",
    "hincrby",
    "hincrbyfloat",
    "hkeys",
    "hlen",
    "hmget",
    "hmset",
    "hscan",
    "hset",
    "hsetnx",
    "hstrlen",
    "hvals",
    "incr",
    "incrby",
    "incrbyfloat",
    "lindex",
    "linsert",
    "llen",
    "lpop",
    "lpush",
    "lpushx",
    "lrange",
    "lrem",
    "lset",
    "ltrim",
    "persist",
    "pexpire",
    "pexpireat",
    "pfadd",
    "pfcount",
    "psetex",
    "pttl",
    "restore",
    "rpop",
    "rpush",
    "rpushx",
    "sadd",
    "scard",
    "set",
    "setbit",
    "setex",
    "setnx",
    "setrange",
    "sismember",
    "smembers",
    "spop",
    "srandmember",
    "srem",
    "sscan",
    "strlen",
    "ttl",
    "type",
    "zadd",
    "zcard",
    "zcount",
    "zincrby",
    "zlexcount",
    "zrange",
    "zrangebylex",
    "zrangebyscore",
    "zrank",
    "zrem",
    "zremrangebylex",
    "zremrangebyrank",
    "zremrangebyscore",
    "zrevrange",
    "zrevrangebylex",
    "zrevrangebyscore",
    "zrevrank",
    "zscan",
    "zscore",
];

/// Scripting commands: `EVAL script numkeys key [key ...] [arg ...]`.
const EVAL_COMMANDS: &[&str] = &["eval", "evalsha"];

const GATHER_COMMANDS: &[&str] = &["mget"];

const ACKNOWLEDGE_COMMANDS: &[&str] = &["mset"];

/// Multi-key commands whose integer replies are added up.
const SUM_COMMANDS: &[&str] = &["del", "exists", "touch", "unlink"];

/// Position of the hashed key in an `EVAL`/`EVALSHA` command.
const EVAL_KEY_INDEX: usize = 3;

/// A command family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandHandler {
    Simple,
    Eval,
    Gather,
    Acknowledge,
    Sum,
}

impl CommandHandler {
    pub const ALL: [CommandHandler; 5] = [
        CommandHandler::Simple,
        CommandHandler::Eval,
        CommandHandler::Gather,
        CommandHandler::Acknowledge,
        CommandHandler::Sum,
    ];

    /// Lowercase names of the commands in this family.
    pub fn commands(self) -> &'static [&'static str] {
        match self {
            CommandHandler::Simple => SIMPLE_COMMANDS,
            CommandHandler::Eval => EVAL_COMMANDS,
            CommandHandler::Gather => GATHER_COMMANDS,
            CommandHandler::Acknowledge => ACKNOWLEDGE_COMMANDS,
            CommandHandler::Sum => SUM_COMMANDS,
        }
    }

    /// Validates the command shape for this family and starts the request.
    ///
    /// `args` are the bulk string elements of `request`, command name
    /// first. Shape errors are replied synchronously and yield `None`.
    pub(crate) fn start_request(
        self,
        pool: &dyn ConnPool,
        request: RespValue,
        args: Vec<Bytes>,
        callbacks: Box<dyn SplitCallbacks>,
        stats: &Arc<CommandStats>,
        time_source: &Arc<dyn TimeSource>,
    ) -> Option<SplitRequest> {
        let stats = Arc::clone(stats);
        match self {
            CommandHandler::Simple => match args.get(1) {
                Some(key) => {
                    start_single(pool, key.clone(), request, callbacks, stats, time_source)
                }
                None => wrong_arguments(&args, callbacks),
            },
            CommandHandler::Eval => match args.get(EVAL_KEY_INDEX) {
                Some(key) => {
                    start_single(pool, key.clone(), request, callbacks, stats, time_source)
                }
                None => wrong_arguments(&args, callbacks),
            },
            CommandHandler::Gather => {
                if args.len() < 2 {
                    return wrong_arguments(&args, callbacks);
                }
                let fragments = args[1..]
                    .iter()
                    .map(|key| Fragment {
                        hash_key: key.clone(),
                        request: RespValue::command([Bytes::from_static(b"get"), key.clone()]),
                    })
                    .collect();
                start_fragmented(
                    pool,
                    Aggregation::Gather,
                    fragments,
                    callbacks,
                    stats,
                    time_source,
                )
            }
            CommandHandler::Acknowledge => {
                if args.len() < 3 || (args.len() - 1) % 2 != 0 {
                    return wrong_arguments(&args, callbacks);
                }
                let fragments = args[1..]
                    .chunks_exact(2)
                    .map(|pair| Fragment {
                        hash_key: pair[0].clone(),
                        request: RespValue::command([
                            Bytes::from_static(b"set"),
                            pair[0].clone(),
                            pair[1].clone(),
                        ]),
                    })
                    .collect();
                start_fragmented(
                    pool,
                    Aggregation::Acknowledge,
                    fragments,
                    callbacks,
                    stats,
                    time_source,
                )
            }
            CommandHandler::Sum => {
                if args.len() < 2 {
                    return wrong_arguments(&args, callbacks);
                }
                let name = &args[0];
                let fragments = args[1..]
                    .iter()
                    .map(|key| Fragment {
                        hash_key: key.clone(),
                        request: RespValue::command([name.clone(), key.clone()]),
                    })
                    .collect();
                start_fragmented(pool, Aggregation::Sum, fragments, callbacks, stats, time_source)
            }
        }
    }
}

fn wrong_arguments(args: &[Bytes], callbacks: Box<dyn SplitCallbacks>) -> Option<SplitRequest> {
    let name = args
        .first()
        .map(|n| String::from_utf8_lossy(n).into_owned())
        .unwrap_or_default();
    debug!(command = %name, args = args.len(), "Wrong number of arguments");
    callbacks.on_response(SplitError::WrongArguments(name).to_reply());
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_families_do_not_overlap() {
        let mut seen = HashSet::new();
        for handler in CommandHandler::ALL {
            for name in handler.commands() {
                assert!(seen.insert(*name), "{} registered twice", name);
                assert_eq!(name.to_lowercase(), *name);
            }
        }
        assert!(seen.contains("get"));
        assert!(seen.contains("evalsha"));
        assert!(seen.contains("touch"));
    }
}
