use ahash::AHashMap;

use crate::error::PropertyError;
use crate::symbols::{Sym, SymbolTable};
use crate::value::{Format, Value};

/// Access mode flags for a property slot.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Access(u8);

impl Access {
    pub const READABLE: Access = Access(0b01);
    pub const WRITABLE: Access = Access(0b10);
    pub const READ_WRITE: Access = Access(0b11);

    pub fn is_readable(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & 2 != 0
    }
}

/// Validating setter: inspect an incoming value before it is stored.
pub type Setter = fn(&Value) -> Result<(), PropertyError>;

/// Computing getter: derive the externally visible value from the stored one.
pub type Getter = fn(&Value) -> Value;

pub struct PropertySlot {
    key: Sym,
    format: Format,
    access: Access,
    value: Value,
    last_update_ns: i64,
    setter: Option<Setter>,
    getter: Option<Getter>,
}

impl PropertySlot {
    pub fn new(key: Sym, initial: Value, access: Access) -> Self {
        Self {
            key,
            format: initial.format(),
            access,
            value: initial,
            last_update_ns: 0,
            setter: None,
            getter: None,
        }
    }

    pub fn with_setter(mut self, setter: Setter) -> Self {
        self.setter = Some(setter);
        self
    }

    pub fn with_getter(mut self, getter: Getter) -> Self {
        self.getter = Some(getter);
        self
    }

    pub fn key(&self) -> Sym {
        self.key
    }

    pub fn access(&self) -> Access {
        self.access
    }
}

/// Statically keyed property store. The key set is fixed once the agent
/// starts; writes bump a per-key monotonic timestamp, reads never mutate.
pub struct PropertyStore {
    slots: Vec<PropertySlot>,
    index: AHashMap<Sym, usize>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(16),
            index: AHashMap::with_capacity(16),
        }
    }

    pub fn define(&mut self, slot: PropertySlot) -> Result<(), PropertyError> {
        if self.index.contains_key(&slot.key) {
            return Err(PropertyError::Validation {
                name: format!("{:?}", slot.key),
                message: "key already defined".to_string(),
            });
        }
        self.index.insert(slot.key, self.slots.len());
        self.slots.push(slot);
        Ok(())
    }

    pub fn contains(&self, key: Sym) -> bool {
        self.index.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = Sym> + '_ {
        self.slots.iter().map(|s| s.key)
    }

    pub fn slot(&self, index: usize) -> Option<&PropertySlot> {
        self.slots.get(index)
    }

    fn lookup(&self, key: Sym, symbols: &SymbolTable) -> Result<usize, PropertyError> {
        self.index
            .get(&key)
            .copied()
            .ok_or_else(|| PropertyError::NotFound(symbols.name(key).to_string()))
    }

    /// Stored value, without an access check. Internal publishing path.
    pub fn value(&self, key: Sym, symbols: &SymbolTable) -> Result<&Value, PropertyError> {
        let idx = self.lookup(key, symbols)?;
        Ok(&self.slots[idx].value)
    }

    /// Externally visible value: checks `READABLE` and applies the
    /// computing getter when present.
    pub fn read(&self, key: Sym, symbols: &SymbolTable) -> Result<Value, PropertyError> {
        let idx = self.lookup(key, symbols)?;
        let slot = &self.slots[idx];
        if !slot.access.is_readable() {
            return Err(PropertyError::Access {
                name: symbols.name(key).to_string(),
                attempted: "read",
            });
        }
        Ok(match slot.getter {
            Some(getter) => getter(&slot.value),
            None => slot.value.clone(),
        })
    }

    /// External write: checks `WRITABLE`, the declared format, and the
    /// validating setter, then stores and bumps the timestamp.
    pub fn write(
        &mut self,
        key: Sym,
        value: Value,
        now_ns: i64,
        symbols: &SymbolTable,
    ) -> Result<(), PropertyError> {
        let idx = self.lookup(key, symbols)?;
        let slot = &self.slots[idx];
        if !slot.access.is_writable() {
            return Err(PropertyError::Access {
                name: symbols.name(key).to_string(),
                attempted: "write",
            });
        }
        self.store(key, value, now_ns, symbols)
    }

    /// Internal write: skips the access check (the agent may update its own
    /// read-only properties), still validates format and setter.
    pub fn store(
        &mut self,
        key: Sym,
        value: Value,
        now_ns: i64,
        symbols: &SymbolTable,
    ) -> Result<(), PropertyError> {
        let idx = self.lookup(key, symbols)?;
        let slot = &mut self.slots[idx];
        if value.format() != slot.format {
            return Err(PropertyError::Type {
                name: symbols.name(key).to_string(),
                expected: slot.format,
                actual: value.format(),
            });
        }
        if let Some(setter) = slot.setter {
            setter(&value)?;
        }
        slot.value = value;
        // strictly monotonic even when the cached clock is frozen, so
        // OnUpdate sees back-to-back writes within one tick
        slot.last_update_ns = now_ns.max(slot.last_update_ns + 1);
        Ok(())
    }

    pub fn last_update_ns(&self, key: Sym, symbols: &SymbolTable) -> Result<i64, PropertyError> {
        let idx = self.lookup(key, symbols)?;
        Ok(self.slots[idx].last_update_ns)
    }
}

impl Default for PropertyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Declarative property-set builder:
///
/// ```ignore
/// properties!(store, symbols, {
///     "Gain": Access::READ_WRITE => Value::Float(1.0);
///     "LogLevel": Access::READ_WRITE => Value::Str("info".into()), setter = validate_level;
/// });
/// ```
#[macro_export]
macro_rules! properties {
    ($store:expr, $symbols:expr, { $( $name:literal : $access:expr => $init:expr $(, setter = $setter:expr)? $(, getter = $getter:expr)? );* $(;)? }) => {{
        $(
            {
                let key = $symbols.intern($name);
                #[allow(unused_mut)]
                let mut slot = $crate::properties::PropertySlot::new(key, $init, $access);
                $( slot = slot.with_setter($setter); )?
                $( slot = slot.with_getter($getter); )?
                $store.define(slot)?;
            }
        )*
    }};
}
