use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::runtime::value::{Heap, Value, ValueId};

/// A lexical scope frame: a name→value table plus a non-owning reference
/// to the enclosing frame.
///
/// Binding inserts into this frame only; lookup optionally walks the
/// parent chain. The chain is never cyclic: frames only point outward,
/// and a frame lives as long as any function value closes over it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Env {
    pub parent: Option<ValueId>,
    table: HashMap<String, ValueId>,
}

impl Env {
    pub fn new(parent: Option<ValueId>) -> Self {
        Env {
            parent,
            table: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Binds a name in this frame, replacing any previous binding.
    pub fn define(&mut self, name: &str, value: ValueId) {
        self.table.insert(name.to_string(), value);
    }

    /// Looks a name up in this frame only.
    pub fn get(&self, name: &str) -> Option<ValueId> {
        self.table.get(name).copied()
    }

    /// Values bound in this frame, for the collector's trace walk.
    pub fn bindings(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.table.values().copied()
    }
}

impl Heap {
    fn env(&self, env: ValueId) -> &Env {
        match self.get(env) {
            Value::Env(frame) => frame,
            other => panic!("value {env} is not an environment: {other:?}"),
        }
    }

    /// Allocates a child frame of `parent`.
    pub fn new_env(&mut self, parent: Option<ValueId>) -> ValueId {
        self.alloc(Value::Env(Env::new(parent)))
    }

    pub fn env_parent(&self, env: ValueId) -> Option<ValueId> {
        self.env(env).parent
    }

    /// Binds a name in the given frame.
    pub fn env_define(&mut self, env: ValueId, name: &str, value: ValueId) {
        match self.get_mut(env) {
            Value::Env(frame) => frame.define(name, value),
            other => panic!("value {env} is not an environment: {other:?}"),
        }
    }

    /// Resolves a name, walking the parent chain when `search_parent`.
    pub fn env_lookup(
        &self,
        env: ValueId,
        name: &str,
        search_parent: bool,
    ) -> Option<ValueId> {
        let mut current = Some(env);
        while let Some(id) = current {
            let frame = self.env(id);
            if let Some(value) = frame.get(name) {
                return Some(value);
            }
            if !search_parent {
                return None;
            }
            current = frame.parent;
        }
        None
    }

    pub fn env_is_defined(&self, env: ValueId, name: &str, search_parent: bool) -> bool {
        self.env_lookup(env, name, search_parent).is_some()
    }
}
