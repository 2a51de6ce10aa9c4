//! Command Registry
//!
//! Maps a command name to its [`CommandHandler`] and [`CommandStats`].
//! Names are stored lowercase in a byte trie and looked up through a
//! precomputed ASCII lowercase table, so `GET`, `get` and `GeT` hit the
//! same entry without allocating, and an unknown name stops at the first
//! byte that leaves the trie.
//!
//! The registry is filled once and then only read, so it can be shared
//! behind an `Arc` by any number of splitters.

use super::handler::CommandHandler;
use crate::config::SplitterConfig;
use crate::stats::CommandStats;
use std::sync::Arc;

/// ASCII-only lowercase mapping, independent of locale.
pub struct ToLowerTable {
    table: [u8; 256],
}

impl ToLowerTable {
    pub const fn new() -> Self {
        let mut table = [0u8; 256];
        let mut i = 0;
        while i < 256 {
            let b = i as u8;
            table[i] = if b >= b'A' && b <= b'Z' { b + 32 } else { b };
            i += 1;
        }
        Self { table }
    }

    #[inline]
    pub fn lower(&self, byte: u8) -> u8 {
        self.table[byte as usize]
    }

    pub fn to_lower(&self, input: &[u8]) -> Vec<u8> {
        input.iter().map(|b| self.lower(*b)).collect()
    }
}

impl Default for ToLowerTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared lowercase table.
pub static TO_LOWER: ToLowerTable = ToLowerTable::new();

struct TrieNode<V> {
    value: Option<V>,
    /// Child node indexes, sorted by byte.
    children: Vec<(u8, usize)>,
}

impl<V> TrieNode<V> {
    fn new() -> Self {
        Self {
            value: None,
            children: Vec::new(),
        }
    }

    fn child(&self, byte: u8) -> Option<usize> {
        self.children
            .binary_search_by_key(&byte, |(b, _)| *b)
            .ok()
            .map(|pos| self.children[pos].1)
    }
}

/// Byte trie keyed by exact byte strings.
pub struct TrieLookupTable<V> {
    nodes: Vec<TrieNode<V>>,
}

impl<V> TrieLookupTable<V> {
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::new()],
        }
    }

    /// Adds `value` under `key`. An existing value is kept and `false` is
    /// returned.
    pub fn add(&mut self, key: &[u8], value: V) -> bool {
        let mut current = 0;
        for &byte in key {
            current = match self.nodes[current].child(byte) {
                Some(next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(TrieNode::new());
                    let children = &mut self.nodes[current].children;
                    let pos = children.partition_point(|(b, _)| *b < byte);
                    children.insert(pos, (byte, next));
                    next
                }
            };
        }

        let node = &mut self.nodes[current];
        if node.value.is_some() {
            return false;
        }
        node.value = Some(value);
        true
    }

    pub fn find(&self, key: &[u8]) -> Option<&V> {
        self.find_mapped(key, |b| b)
    }

    /// Looks up `key` with every byte passed through `map` first.
    pub fn find_mapped(&self, key: &[u8], map: impl Fn(u8) -> u8) -> Option<&V> {
        let mut current = 0;
        for &byte in key {
            current = self.nodes[current].child(map(byte))?;
        }
        self.nodes[current].value.as_ref()
    }
}

impl<V> Default for TrieLookupTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered handler and the stats of its command.
#[derive(Debug, Clone)]
pub struct HandlerEntry {
    pub handler: CommandHandler,
    pub stats: Arc<CommandStats>,
}

/// Command name → handler table.
pub struct CommandRegistry {
    config: SplitterConfig,
    table: TrieLookupTable<HandlerEntry>,
    names: Vec<String>,
}

impl CommandRegistry {
    /// Creates an empty registry. Stats created by [`register`](Self::register)
    /// use the prefix and buckets from `config`.
    pub fn new(config: SplitterConfig) -> Self {
        Self {
            config,
            table: TrieLookupTable::new(),
            names: Vec::new(),
        }
    }

    /// Creates a registry holding every supported command.
    pub fn with_supported_commands(config: SplitterConfig) -> Self {
        let mut registry = Self::new(config);
        for handler in CommandHandler::ALL {
            for name in handler.commands() {
                registry.register(name, handler);
            }
        }
        registry
    }

    /// Registers `name` (case-insensitive). Returns `false` if the name was
    /// already registered; the first registration wins.
    pub fn register(&mut self, name: &str, handler: CommandHandler) -> bool {
        let lower = TO_LOWER.to_lower(name.as_bytes());
        if self.table.find(&lower).is_some() {
            return false;
        }

        let lower_name = String::from_utf8_lossy(&lower).into_owned();
        let entry = HandlerEntry {
            handler,
            stats: Arc::new(CommandStats::new(&lower_name, &self.config)),
        };
        self.table.add(&lower, entry);
        let pos = self.names.partition_point(|n| *n < lower_name);
        self.names.insert(pos, lower_name);
        true
    }

    /// Case-insensitive lookup.
    pub fn lookup(&self, name: &[u8]) -> Option<&HandlerEntry> {
        self.table.find_mapped(name, |b| TO_LOWER.lower(b))
    }

    /// Registered names, lowercase and sorted.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};

    #[test]
    fn test_to_lower_table() {
        assert_eq!(TO_LOWER.to_lower(b"GeT"), b"get".to_vec());
        assert_eq!(TO_LOWER.to_lower(b"ZREVRANGE_1"), b"zrevrange_1".to_vec());
        // Non-ASCII bytes pass through untouched
        assert_eq!(TO_LOWER.lower(0xC9), 0xC9);
        assert_eq!(TO_LOWER.lower(b'['), b'[');
    }

    #[test]
    fn test_trie_add_find() {
        let mut trie = TrieLookupTable::new();
        assert!(trie.add(b"get", 1));
        assert!(trie.add(b"getset", 2));
        assert!(trie.add(b"getbit", 3));
        assert!(!trie.add(b"get", 4));

        assert_eq!(trie.find(b"get"), Some(&1));
        assert_eq!(trie.find(b"getset"), Some(&2));
        assert_eq!(trie.find(b"getbit"), Some(&3));
        // Prefix of a key but not itself a key
        assert_eq!(trie.find(b"ge"), None);
        assert_eq!(trie.find(b"gets"), None);
        assert_eq!(trie.find(b"getsetx"), None);
        assert_eq!(trie.find(b""), None);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = CommandRegistry::with_supported_commands(SplitterConfig::default());
        let lower = registry.lookup(b"get").unwrap();
        let upper = registry.lookup(b"GET").unwrap();
        let mixed = registry.lookup(b"GeT").unwrap();

        assert_eq!(lower.handler, CommandHandler::Simple);
        assert!(Arc::ptr_eq(&lower.stats, &upper.stats));
        assert!(Arc::ptr_eq(&lower.stats, &mixed.stats));
        assert_eq!(lower.stats.name(), "get");
    }

    #[test]
    fn test_supported_families() {
        let registry = CommandRegistry::with_supported_commands(SplitterConfig::default());
        assert_eq!(registry.lookup(b"EVAL").unwrap().handler, CommandHandler::Eval);
        assert_eq!(registry.lookup(b"mget").unwrap().handler, CommandHandler::Gather);
        assert_eq!(
            registry.lookup(b"MSet").unwrap().handler,
            CommandHandler::Acknowledge
        );
        assert_eq!(registry.lookup(b"unlink").unwrap().handler, CommandHandler::Sum);
        assert!(registry.lookup(b"foobar").is_none());
        assert!(registry.lookup(b"keys").is_none());
    }

    #[test]
    fn test_register_is_first_wins() {
        let mut registry = CommandRegistry::new(SplitterConfig::default());
        assert!(registry.register("GET", CommandHandler::Simple));
        let original = Arc::clone(&registry.lookup(b"get").unwrap().stats);
        original.request_started();

        assert!(!registry.register("get", CommandHandler::Eval));
        let entry = registry.lookup(b"get").unwrap();
        assert_eq!(entry.handler, CommandHandler::Simple);
        assert!(Arc::ptr_eq(&entry.stats, &original));
        assert_eq!(entry.stats.snapshot().total, 1);
        assert_eq!(registry.len(), 1);
    }

    /// Records the name of every counter handle created under it.
    #[derive(Default)]
    struct CountingRecorder {
        counters: std::sync::Mutex<Vec<String>>,
    }

    impl Recorder for CountingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            self.counters.lock().unwrap().push(key.name().to_string());
            Counter::noop()
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_duplicate_register_creates_no_stats() {
        let recorder = CountingRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            let mut registry = CommandRegistry::new(SplitterConfig::with_stat_prefix("dup."));
            assert!(registry.register("get", CommandHandler::Simple));
            assert!(!registry.register("GET", CommandHandler::Eval));
        });

        let counters = recorder.counters.lock().unwrap();
        let totals = counters.iter().filter(|n| *n == "dup.command.get.total").count();
        assert_eq!(totals, 1);
    }

    #[test]
    fn test_commands_sorted() {
        let mut registry = CommandRegistry::new(SplitterConfig::default());
        registry.register("mset", CommandHandler::Acknowledge);
        registry.register("DEL", CommandHandler::Sum);
        registry.register("get", CommandHandler::Simple);
        let names: Vec<&str> = registry.commands().collect();
        assert_eq!(names, vec!["del", "get", "mset"]);
    }
}
