//! Configuration schemas.
//!
//! A [`Schema`] records the Rust type registered for a configuration key.
//! Values travel through providers as [`serde_json::Value`] trees; the schema
//! supplies the zero-value shape used to interpret them and a normalizer that
//! round-trips a partial tree through the concrete type.

use std::any::{type_name, TypeId};
use std::fmt;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::merge::overlay;
use crate::ConfigError;

/// Bound for types that can be stored as configuration values.
pub trait ConfigValue: Serialize + DeserializeOwned + Default + Send + Sync + 'static {}

impl<T> ConfigValue for T where T: Serialize + DeserializeOwned + Default + Send + Sync + 'static {}

/// Runtime description of a registered configuration type.
#[derive(Clone, Copy)]
pub struct Schema {
    type_id: TypeId,
    type_name: &'static str,
    shape: fn() -> Result<Value, serde_json::Error>,
    normalize: fn(Value) -> Result<Value, serde_json::Error>,
}

impl Schema {
    /// Describes the type `T`.
    pub fn of<T: ConfigValue>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            shape: || serde_json::to_value(T::default()),
            normalize: |value| serde_json::from_value::<T>(value).and_then(serde_json::to_value),
        }
    }

    /// Returns true if this schema describes `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Type id of the registered type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified name of the registered type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Serialized form of `T::default()`.
    pub fn shape(&self) -> Result<Value, ConfigError> {
        Ok((self.shape)()?)
    }

    /// Interprets a partial provider value as a complete value of the type.
    ///
    /// Fields missing from `partial` take their zero value.
    pub fn normalize(&self, partial: Value) -> Result<Value, ConfigError> {
        let mut base = self.shape()?;
        overlay(&mut base, partial);
        Ok((self.normalize)(base)?)
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for Schema {}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .finish()
    }
}
