use crate::runtime::error::CoralError;
use crate::runtime::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Index into the arena. Scope records are never freed individually; captured
/// ids stay valid for the life of the `State`, which is what lets function
/// values and deferred `finally` blocks outlive the steps that created them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeId(usize);

pub type LookupFn = Rc<dyn Fn(&str) -> Option<Value>>;

pub enum ScopeKind {
    /// Ordinary block scope. Reads delegate to the parent; writes go to the
    /// nearest scope that already holds the name, else land locally.
    Standard,
    /// Function-call scope. Holds exactly the parameter names; everything
    /// else passes through to the parent.
    Parameter,
    /// Root scope of registered constants. Writes are an error; reads of
    /// unknown names resolve to null.
    Const,
    /// Read-only name source backed by a host callback.
    Lookup(LookupFn),
}

struct ScopeRecord {
    kind: ScopeKind,
    values: HashMap<String, Value>,
    parent: Option<ScopeId>,
}

#[derive(Default)]
pub struct ScopeArena {
    records: Vec<ScopeRecord>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        self.records.push(ScopeRecord {
            kind,
            values: HashMap::new(),
            parent,
        });
        ScopeId(self.records.len() - 1)
    }

    pub fn alloc_standard(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.alloc(ScopeKind::Standard, parent)
    }

    /// Parameter scopes pre-seed their names so that `has` and `set` treat
    /// them as held locally even before binding.
    pub fn alloc_parameter(&mut self, parent: ScopeId, names: &[String]) -> ScopeId {
        let id = self.alloc(ScopeKind::Parameter, Some(parent));
        for name in names {
            self.records[id.0].values.insert(name.clone(), Value::Null);
        }
        id
    }

    pub fn alloc_const(&mut self) -> ScopeId {
        self.alloc(ScopeKind::Const, None)
    }

    pub fn alloc_lookup(&mut self, parent: ScopeId, lookup: LookupFn) -> ScopeId {
        self.alloc(ScopeKind::Lookup(lookup), Some(parent))
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.records[id.0].parent
    }

    pub fn get(&self, id: ScopeId, name: &str) -> Result<Value, CoralError> {
        let mut current = Some(id);
        while let Some(id) = current {
            let record = &self.records[id.0];
            match &record.kind {
                ScopeKind::Standard | ScopeKind::Parameter => {
                    if let Some(value) = record.values.get(name) {
                        return Ok(value.clone());
                    }
                }
                ScopeKind::Const => {
                    return Ok(record.values.get(name).cloned().unwrap_or(Value::Null));
                }
                ScopeKind::Lookup(lookup) => {
                    if let Some(value) = lookup(name) {
                        return Ok(value);
                    }
                }
            }
            current = record.parent;
        }
        Err(CoralError::arg(format!("Undefined variable '{}'", name)))
    }

    pub fn has(&self, id: ScopeId, name: &str) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            let record = &self.records[id.0];
            let held = match &record.kind {
                ScopeKind::Standard | ScopeKind::Parameter | ScopeKind::Const => {
                    record.values.contains_key(name)
                }
                ScopeKind::Lookup(lookup) => lookup(name).is_some(),
            };
            if held {
                return true;
            }
            current = record.parent;
        }
        false
    }

    /// Writes to the nearest scope that holds the name; a fresh name lands
    /// in the innermost writable scope.
    pub fn set(&mut self, id: ScopeId, name: &str, value: Value) -> Result<(), CoralError> {
        let mut current = Some(id);
        let mut fallback = None;
        while let Some(id) = current {
            let record = &self.records[id.0];
            let parent = record.parent;
            match &record.kind {
                ScopeKind::Standard | ScopeKind::Parameter => {
                    if record.values.contains_key(name) {
                        self.records[id.0].values.insert(name.to_string(), value);
                        return Ok(());
                    }
                    if fallback.is_none() {
                        fallback = Some(id);
                    }
                }
                ScopeKind::Const => {
                    if record.values.contains_key(name) {
                        return Err(CoralError::invop(format!(
                            "Can't set constant '{}'",
                            name
                        )));
                    }
                }
                ScopeKind::Lookup(lookup) => {
                    if lookup(name).is_some() {
                        return Err(CoralError::invop(format!(
                            "Can't set read-only variable '{}'",
                            name
                        )));
                    }
                }
            }
            current = parent;
        }
        match fallback {
            Some(id) => {
                self.records[id.0].values.insert(name.to_string(), value);
                Ok(())
            }
            None => Err(CoralError::invop(format!(
                "No writable scope for variable '{}'",
                name
            ))),
        }
    }

    /// Writes directly into the given record, bypassing delegation. Used for
    /// parameter binding and loop variables.
    pub fn set_local(&mut self, id: ScopeId, name: &str, value: Value) {
        self.records[id.0].values.insert(name.to_string(), value);
    }

    pub fn delete(&mut self, id: ScopeId, name: &str) -> Result<(), CoralError> {
        let mut current = Some(id);
        while let Some(id) = current {
            let record = &self.records[id.0];
            let parent = record.parent;
            match &record.kind {
                ScopeKind::Standard | ScopeKind::Parameter => {
                    if record.values.contains_key(name) {
                        self.records[id.0].values.remove(name);
                        return Ok(());
                    }
                }
                ScopeKind::Const => {
                    if record.values.contains_key(name) {
                        return Err(CoralError::invop(format!(
                            "Can't delete constant '{}'",
                            name
                        )));
                    }
                }
                ScopeKind::Lookup(_) => {}
            }
            current = parent;
        }
        Ok(())
    }

    /// Registers a constant; only valid on const records.
    pub fn define_const(&mut self, id: ScopeId, name: &str, value: Value) -> Result<(), CoralError> {
        match self.records[id.0].kind {
            ScopeKind::Const => {
                self.records[id.0].values.insert(name.to_string(), value);
                Ok(())
            }
            _ => Err(CoralError::invprog(
                "Constants can only be registered in a const scope",
            )),
        }
    }
}
