use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mesh::MaterialRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Text(String),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Float(_) => "float",
            ParamValue::Int(_) => "int",
            ParamValue::Bool(_) => "bool",
            ParamValue::Vec2(_) => "vec2",
            ParamValue::Vec3(_) => "vec3",
            ParamValue::Text(_) => "text",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeParams {
    pub values: BTreeMap<String, ParamValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    #[error("unknown parameter `{0}`")]
    Unknown(String),
    #[error("parameter `{name}` expects {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: String,
    },
}

pub trait ParamKind: Sized {
    const EXPECTED: &'static str;

    fn to_value(&self) -> ParamValue;
    fn from_value(value: &ParamValue) -> Option<Self>;
}

impl ParamKind for f32 {
    const EXPECTED: &'static str = "float";

    fn to_value(&self) -> ParamValue {
        ParamValue::Float(*self)
    }

    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f32),
            _ => None,
        }
    }
}

impl ParamKind for i32 {
    const EXPECTED: &'static str = "int";

    fn to_value(&self) -> ParamValue {
        ParamValue::Int(*self)
    }

    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl ParamKind for bool {
    const EXPECTED: &'static str = "bool";

    fn to_value(&self) -> ParamValue {
        ParamValue::Bool(*self)
    }

    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl ParamKind for [f32; 2] {
    const EXPECTED: &'static str = "vec2";

    fn to_value(&self) -> ParamValue {
        ParamValue::Vec2(*self)
    }

    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Vec2(v) => Some(*v),
            _ => None,
        }
    }
}

impl ParamKind for [f32; 3] {
    const EXPECTED: &'static str = "vec3";

    fn to_value(&self) -> ParamValue {
        ParamValue::Vec3(*self)
    }

    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Vec3(v) => Some(*v),
            _ => None,
        }
    }
}

impl ParamKind for MaterialRef {
    const EXPECTED: &'static str = "material name";

    fn to_value(&self) -> ParamValue {
        ParamValue::Text(self.0.clone())
    }

    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Text(v) => Some(MaterialRef(v.clone())),
            _ => None,
        }
    }
}

/// Implements [`ParamKind`] for a fieldless enum stored as a text choice.
#[macro_export]
macro_rules! choice_param {
    ($ty:ty, $expected:literal, { $($variant:path => $name:literal),+ $(,)? }) => {
        impl $crate::params::ParamKind for $ty {
            const EXPECTED: &'static str = $expected;

            fn to_value(&self) -> $crate::params::ParamValue {
                let name = match self {
                    $($variant => $name,)+
                };
                $crate::params::ParamValue::Text(name.to_string())
            }

            fn from_value(value: &$crate::params::ParamValue) -> Option<Self> {
                match value {
                    $crate::params::ParamValue::Text(text) => match text.as_str() {
                        $($name => Some($variant),)+
                        _ => None,
                    },
                    _ => None,
                }
            }
        }
    };
}

type Getter<S> = Box<dyn Fn(&S) -> ParamValue + Send + Sync>;
type Setter<S> = Box<dyn Fn(&mut S, &ParamValue) -> Result<(), ParamError> + Send + Sync>;

struct ParamEntry<S> {
    name: &'static str,
    get: Getter<S>,
    set: Setter<S>,
}

/// Name-addressed parameter table over a settings struct `S`. Each entry is a
/// pair of typed accessors, so lookups by name never need reflection.
pub struct ParamRegistry<S> {
    entries: Vec<ParamEntry<S>>,
}

impl<S: 'static> ParamRegistry<S> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn field<T, R, W>(mut self, name: &'static str, read: R, write: W) -> Self
    where
        T: ParamKind + 'static,
        R: Fn(&S) -> &T + Send + Sync + 'static,
        W: Fn(&mut S) -> &mut T + Send + Sync + 'static,
    {
        let get: Getter<S> = Box::new(move |settings| read(settings).to_value());
        let set: Setter<S> = Box::new(move |settings, value| {
            let parsed = T::from_value(value).ok_or_else(|| ParamError::TypeMismatch {
                name: name.to_string(),
                expected: T::EXPECTED,
                found: describe(value),
            })?;
            *write(settings) = parsed;
            Ok(())
        });
        self.entries.push(ParamEntry { name, get, set });
        self
    }

    fn entry(&self, name: &str) -> Option<&ParamEntry<S>> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn get(&self, settings: &S, name: &str) -> Option<ParamValue> {
        self.entry(name).map(|entry| (entry.get)(settings))
    }

    pub fn set(&self, settings: &mut S, name: &str, value: &ParamValue) -> Result<(), ParamError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| ParamError::Unknown(name.to_string()))?;
        (entry.set)(settings, value)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    pub fn snapshot(&self, settings: &S) -> NodeParams {
        NodeParams {
            values: self
                .entries
                .iter()
                .map(|entry| (entry.name.to_string(), (entry.get)(settings)))
                .collect(),
        }
    }
}

impl<S: 'static> Default for ParamRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(value: &ParamValue) -> String {
    match value {
        ParamValue::Text(text) => format!("text \"{text}\""),
        other => other.type_name().to_string(),
    }
}

/// Registers `settings.<path>` under `name`.
#[macro_export]
macro_rules! bind_param {
    ($registry:expr, $name:literal, $($field:ident).+) => {
        $registry.field($name, |s| &s.$($field).+, |s| &mut s.$($field).+)
    };
}
