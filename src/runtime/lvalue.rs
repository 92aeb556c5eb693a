use crate::runtime::error::CoralError;
use crate::runtime::scope::ScopeId;
use crate::runtime::state::State;
use crate::runtime::value::Value;

/// A transient read/write handle to a storage location. These only ever live
/// on the result stack between the step that produced them and the step that
/// dereferences or assigns through them.
#[derive(Clone, Debug)]
pub enum LValue {
    Variable { scope: ScopeId, name: String },
    Member { object: Value, name: String },
    Index { object: Value, index: Value },
}

impl LValue {
    pub fn read(&self, state: &mut State) -> Result<Value, CoralError> {
        match self {
            LValue::Variable { scope, name } => state.scopes.get(*scope, name),
            LValue::Member { object, name } => match object {
                Value::Map(map) => map.get(&Value::str(name.as_str())).ok_or_else(|| {
                    CoralError::arg(format!("Map has no member '{}'", name))
                }),
                Value::Native(obj) => obj.get_member(state, name),
                other => Err(CoralError::arg(format!(
                    "Can't read member '{}' of a {} value",
                    name,
                    other.type_name()
                ))),
            },
            LValue::Index { object, index } => match object {
                Value::List(items) => {
                    let idx = list_index(index, items.len())?;
                    items.get(idx).ok_or_else(|| {
                        CoralError::arg(format!("List index {} out of range", idx))
                    })
                }
                Value::Map(map) => map.get(index).ok_or_else(|| {
                    CoralError::arg(format!("Map has no entry for key {}", index))
                }),
                Value::Native(obj) => obj.get_index(state, index),
                other => Err(CoralError::arg(format!(
                    "Can't index a {} value",
                    other.type_name()
                ))),
            },
        }
    }

    pub fn write(&self, state: &mut State, value: Value) -> Result<(), CoralError> {
        match self {
            LValue::Variable { scope, name } => state.scopes.set(*scope, name, value),
            LValue::Member { object, name } => match object {
                Value::Map(map) => {
                    map.insert(Value::str(name.as_str()), value);
                    Ok(())
                }
                Value::Native(obj) => obj.set_member(state, name, value),
                other => Err(CoralError::arg(format!(
                    "Can't write member '{}' of a {} value",
                    name,
                    other.type_name()
                ))),
            },
            LValue::Index { object, index } => match object {
                Value::List(items) => {
                    let idx = list_index(index, items.len())?;
                    if items.set(idx, value) {
                        Ok(())
                    } else {
                        Err(CoralError::arg(format!(
                            "List index {} out of range",
                            idx
                        )))
                    }
                }
                Value::Map(map) => {
                    map.insert(index.clone(), value);
                    Ok(())
                }
                Value::Native(obj) => obj.set_index(state, index, value),
                other => Err(CoralError::arg(format!(
                    "Can't index a {} value",
                    other.type_name()
                ))),
            },
        }
    }
}

fn list_index(index: &Value, len: usize) -> Result<usize, CoralError> {
    let idx = index.coerce_int()?;
    if idx < 0 || idx as usize >= len {
        return Err(CoralError::arg(format!("List index {} out of range", idx)));
    }
    Ok(idx as usize)
}

/// One result-stack entry: either a settled value or a still-addressable
/// location.
#[derive(Clone, Debug)]
pub enum Slot {
    Value(Value),
    LValue(LValue),
}

impl Slot {
    pub fn deref(self, state: &mut State) -> Result<Value, CoralError> {
        match self {
            Slot::Value(value) => Ok(value),
            Slot::LValue(lvalue) => lvalue.read(state),
        }
    }
}
