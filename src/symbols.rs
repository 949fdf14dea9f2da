use ahash::AHashMap;
use std::fmt;

/// Interned name tag. Events, property keys, and state names are all `Sym`s;
/// handlers dispatch on the integer, the table keeps the string for
/// diagnostics and the wire.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Sym(pub u32);

impl fmt::Debug for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sym({})", self.0)
    }
}

/// Built-in event names, pre-interned at fixed indices by
/// [`SymbolTable::new`]. Order here must match `BUILTIN_NAMES`.
pub mod sym {
    use super::Sym;

    pub const AGENT_STARTED: Sym = Sym(0);
    pub const AGENT_ON_CLOSE: Sym = Sym(1);
    pub const PLAY: Sym = Sym(2);
    pub const PAUSE: Sym = Sym(3);
    pub const STOP: Sym = Sym(4);
    pub const RESET: Sym = Sym(5);
    pub const EXIT: Sym = Sym(6);
    pub const HEARTBEAT: Sym = Sym(7);
    pub const STATE: Sym = Sym(8);
    pub const STATE_CHANGE: Sym = Sym(9);
    pub const ERROR: Sym = Sym(10);
    pub const LATE_MESSAGE: Sym = Sym(11);
    pub const PROPERTIES: Sym = Sym(12);
    pub const PUBLISH_PROPERTY: Sym = Sym(13);
    pub const STATS_UPDATE: Sym = Sym(14);
    pub const MEM_STATS: Sym = Sym(15);
}

const BUILTIN_NAMES: &[&str] = &[
    "AgentStarted",
    "AgentOnClose",
    "Play",
    "Pause",
    "Stop",
    "Reset",
    "Exit",
    "Heartbeat",
    "State",
    "StateChange",
    "Error",
    "LateMessage",
    "Properties",
    "PublishProperty",
    "StatsUpdate",
    "MemStats",
];

/// Side table mapping `Sym` tags to names and back.
///
/// Interning happens at construction time and on first sight of an inbound
/// key; the duty cycle only performs lookups.
#[derive(Debug)]
pub struct SymbolTable {
    names: Vec<String>,
    index: AHashMap<String, Sym>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            names: Vec::with_capacity(64),
            index: AHashMap::with_capacity(64),
        };
        for name in BUILTIN_NAMES {
            table.intern(name);
        }
        table
    }

    pub fn intern(&mut self, name: &str) -> Sym {
        if let Some(sym) = self.index.get(name) {
            return *sym;
        }
        let sym = Sym(self.names.len() as u32);
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), sym);
        sym
    }

    pub fn lookup(&self, name: &str) -> Option<Sym> {
        self.index.get(name).copied()
    }

    #[inline]
    pub fn name(&self, sym: Sym) -> &str {
        self.names
            .get(sym.0 as usize)
            .map(String::as_str)
            .unwrap_or("?")
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
