//! Server-side execution of write batches.
//!
//! Redis `MULTI`/`EXEC` cannot read inside a transaction, and `SetAppend`
//! needs to know whether its set already exists to pick the right expiry.
//! Each batch therefore runs as one Lua script, which Redis executes
//! atomically. The script type-checks every op before writing anything, so
//! a wrong-type batch leaves the data untouched.
//!
//! Encoding: `KEYS[i]` is the key of op `i`; `ARGV` holds, per op, the op
//! name, the expiry in unix milliseconds (empty for none), the item count
//! and then the items.
//!
//! Requires Redis 7 (`PEXPIREAT ... GT`).

use std::sync::LazyLock;

use passport_kv::{KvOp, WriteBatch};
use redis::{Script, ScriptInvocation};
use time::OffsetDateTime;

const BATCH_LUA: &str = r#"
local kinds = {}
local ops = {}
local a = 1
for i, key in ipairs(KEYS) do
  local name = ARGV[a]
  local expiry = ARGV[a + 1]
  local n = tonumber(ARGV[a + 2])
  ops[i] = { name = name, expiry = expiry, first = a + 3, last = a + 2 + n }
  a = a + 3 + n

  local kind = kinds[key]
  if kind == nil then
    kind = redis.call('TYPE', key).ok
  end
  local expected = nil
  if name == 'hreplace' then
    expected = 'hash'
  elseif name == 'sappend' or name == 'srem' then
    expected = 'set'
  end
  if expected ~= nil and kind ~= 'none' and kind ~= expected then
    return redis.error_reply('WRONGTYPE ' .. key .. ' ' .. expected .. ' ' .. kind)
  end
  if name == 'hreplace' then
    if n == 0 then kinds[key] = 'none' else kinds[key] = 'hash' end
  elseif name == 'sappend' then
    kinds[key] = 'set'
  elseif name == 'del' then
    kinds[key] = 'none'
  else
    kinds[key] = kind
  end
end

for i, key in ipairs(KEYS) do
  local op = ops[i]
  if op.name == 'hreplace' then
    redis.call('DEL', key)
    for j = op.first, op.last, 2 do
      redis.call('HSET', key, ARGV[j], ARGV[j + 1])
    end
    if op.expiry ~= '' and op.last >= op.first then
      redis.call('PEXPIREAT', key, op.expiry)
    end
  elseif op.name == 'sappend' then
    local existed = redis.call('EXISTS', key) == 1
    for j = op.first, op.last do
      redis.call('SADD', key, ARGV[j])
    end
    if op.expiry == '' then
      redis.call('PERSIST', key)
    elseif existed then
      redis.call('PEXPIREAT', key, op.expiry, 'GT')
    else
      redis.call('PEXPIREAT', key, op.expiry)
    end
  elseif op.name == 'srem' then
    for j = op.first, op.last do
      redis.call('SREM', key, ARGV[j])
    end
  elseif op.name == 'del' then
    redis.call('DEL', key)
  end
end
return 'OK'
"#;

static BATCH_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(BATCH_LUA));

fn unix_millis(at: Option<OffsetDateTime>) -> String {
    at.map(|at| (at.unix_timestamp_nanos() / 1_000_000).to_string())
        .unwrap_or_default()
}

/// Flattened `(key, args)` form of one op.
pub(crate) fn encode_op(op: &KvOp) -> (&str, Vec<String>) {
    let (name, expiry, items): (&str, String, Vec<&str>) = match op {
        KvOp::HashReplace {
            fields, expires_at, ..
        } => (
            "hreplace",
            unix_millis(*expires_at),
            fields
                .iter()
                .flat_map(|(field, value)| [field.as_str(), value.as_str()])
                .collect(),
        ),
        KvOp::SetAppend {
            members,
            expires_at,
            ..
        } => (
            "sappend",
            unix_millis(*expires_at),
            members.iter().map(String::as_str).collect(),
        ),
        KvOp::SetRemove { members, .. } => (
            "srem",
            String::new(),
            members.iter().map(String::as_str).collect(),
        ),
        KvOp::Delete { .. } => ("del", String::new(), Vec::new()),
    };

    let mut args = Vec::with_capacity(items.len() + 3);
    args.push(name.to_string());
    args.push(expiry);
    args.push(items.len().to_string());
    args.extend(items.into_iter().map(str::to_string));
    (op.key(), args)
}

/// Builds the script invocation for `batch`.
pub(crate) fn invocation(batch: &WriteBatch) -> ScriptInvocation<'static> {
    let mut invocation = BATCH_SCRIPT.prepare_invoke();
    for op in batch.ops() {
        let (key, args) = encode_op(op);
        invocation.key(key);
        for arg in args {
            invocation.arg(arg);
        }
    }
    invocation
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_encode_hash_replace() {
        let op = KvOp::HashReplace {
            key: "g:1".to_string(),
            fields: vec![
                ("key".to_string(), "1".to_string()),
                ("data".to_string(), "x".to_string()),
            ],
            expires_at: Some(datetime!(2030-01-01 0:00 UTC)),
        };
        let (key, args) = encode_op(&op);
        assert_eq!(key, "g:1");
        assert_eq!(
            args,
            vec!["hreplace", "1893456000000", "4", "key", "1", "data", "x"]
        );
    }

    #[test]
    fn test_encode_persistent_set_append() {
        let op = KvOp::SetAppend {
            key: "g:alice".to_string(),
            members: vec!["g:1".to_string()],
            expires_at: None,
        };
        let (_, args) = encode_op(&op);
        assert_eq!(args, vec!["sappend", "", "1", "g:1"]);
    }

    #[test]
    fn test_encode_delete() {
        let op = KvOp::Delete {
            key: "gone".to_string(),
        };
        let (key, args) = encode_op(&op);
        assert_eq!(key, "gone");
        assert_eq!(args, vec!["del", "", "0"]);
    }
}
