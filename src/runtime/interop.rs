use crate::runtime::async_action::AsyncAction;
use crate::runtime::error::CoralError;
use crate::runtime::state::State;
use crate::runtime::value::{FunctionValue, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// What a host function hands back: either an immediate result, or a list of
/// actions for the machine to decode into further steps.
pub enum NativeOutcome {
    Value(Value),
    Actions(Vec<AsyncAction>),
}

pub type NativeFn = Rc<dyn Fn(&mut State, Vec<Value>) -> Result<NativeOutcome, CoralError>>;

pub type PropertyGet = Rc<dyn Fn(&mut State) -> Result<Value, CoralError>>;
pub type PropertySet = Rc<dyn Fn(&mut State, Value) -> Result<(), CoralError>>;

/// Capability contract for host values exposed to scripts. Unknown members
/// and indices must come back as argument errors, never host faults.
pub trait NativeObject {
    fn type_name(&self) -> &'static str {
        "native"
    }

    fn has_member(&self, name: &str) -> bool;

    fn get_member(&self, state: &mut State, name: &str) -> Result<Value, CoralError>;

    fn set_member(&self, state: &mut State, name: &str, value: Value) -> Result<(), CoralError>;

    fn get_index(&self, _state: &mut State, _index: &Value) -> Result<Value, CoralError> {
        Err(CoralError::arg(format!(
            "A {} value can't be indexed",
            self.type_name()
        )))
    }

    fn set_index(
        &self,
        _state: &mut State,
        _index: &Value,
        _value: Value,
    ) -> Result<(), CoralError> {
        Err(CoralError::arg(format!(
            "A {} value can't be indexed",
            self.type_name()
        )))
    }
}

enum Member {
    Property {
        get: PropertyGet,
        set: Option<PropertySet>,
    },
    Method(NativeFn),
}

/// A host object assembled from an explicit member table. Registration
/// happens once, up front; resolution is a plain name lookup.
pub struct HostObject {
    type_name: &'static str,
    members: HashMap<String, Member>,
}

impl HostObject {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            members: HashMap::new(),
        }
    }

    pub fn property(
        mut self,
        name: &str,
        get: impl Fn(&mut State) -> Result<Value, CoralError> + 'static,
    ) -> Self {
        self.members.insert(
            name.to_string(),
            Member::Property {
                get: Rc::new(get),
                set: None,
            },
        );
        self
    }

    pub fn property_rw(
        mut self,
        name: &str,
        get: impl Fn(&mut State) -> Result<Value, CoralError> + 'static,
        set: impl Fn(&mut State, Value) -> Result<(), CoralError> + 'static,
    ) -> Self {
        self.members.insert(
            name.to_string(),
            Member::Property {
                get: Rc::new(get),
                set: Some(Rc::new(set)),
            },
        );
        self
    }

    pub fn method(
        mut self,
        name: &str,
        f: impl Fn(&mut State, Vec<Value>) -> Result<NativeOutcome, CoralError> + 'static,
    ) -> Self {
        self.members
            .insert(name.to_string(), Member::Method(Rc::new(f)));
        self
    }

    pub fn into_value(self) -> Value {
        Value::Native(Rc::new(self))
    }
}

impl NativeObject for HostObject {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn has_member(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    fn get_member(&self, state: &mut State, name: &str) -> Result<Value, CoralError> {
        match self.members.get(name) {
            Some(Member::Property { get, .. }) => get(state),
            Some(Member::Method(f)) => Ok(native_function(name, Rc::clone(f))),
            None => Err(CoralError::arg(format!(
                "A {} value has no member '{}'",
                self.type_name, name
            ))),
        }
    }

    fn set_member(&self, state: &mut State, name: &str, value: Value) -> Result<(), CoralError> {
        match self.members.get(name) {
            Some(Member::Property { set: Some(set), .. }) => set(state, value),
            Some(_) => Err(CoralError::invop(format!(
                "Member '{}' of a {} value is read-only",
                name, self.type_name
            ))),
            None => Err(CoralError::arg(format!(
                "A {} value has no member '{}'",
                self.type_name, name
            ))),
        }
    }
}

/// Wraps a host closure as a callable script value.
pub fn native_fn(
    name: &str,
    f: impl Fn(&mut State, Vec<Value>) -> Result<NativeOutcome, CoralError> + 'static,
) -> Value {
    native_function(name, Rc::new(f))
}

fn native_function(name: &str, f: NativeFn) -> Value {
    Value::Function(Rc::new(FunctionValue::Native {
        name: name.to_string(),
        f,
    }))
}
