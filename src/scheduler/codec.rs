//! Argument encoding between live values and their persistable form.
//!
//! Tasks are invoked with [`Arg`]s, which may hold live domain entities. The
//! queues only ever hold [`Value`]s: each entity is swapped for an
//! [`Value::EntityRef`] carrying its id on the way in, and resolved back on
//! the way out through whichever [`ArgumentCodec`] the scheduler was built
//! with.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tvnab_common::{EntityId, Value};

/// A live domain object that can be referenced from task arguments.
pub trait Entity: Any + Send + Sync + fmt::Debug {
    fn id(&self) -> EntityId;

    fn as_any(&self) -> &dyn Any;
}

/// A decoded task argument.
#[derive(Debug, Clone)]
pub enum Arg {
    Value(Value),
    Entity(Arc<dyn Entity>),
}

impl Arg {
    pub fn entity(entity: Arc<dyn Entity>) -> Self {
        Self::Entity(entity)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Entity(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_entity(&self) -> Option<&Arc<dyn Entity>> {
        match self {
            Self::Entity(e) => Some(e),
            Self::Value(_) => None,
        }
    }

    /// Downcast an entity argument to its concrete type.
    pub fn downcast<T: Entity>(&self) -> Option<&T> {
        self.as_entity()?.as_any().downcast_ref::<T>()
    }

    /// The persistable form of this argument.
    pub fn encoded(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Entity(e) => Value::EntityRef(e.id()),
        }
    }
}

// Entities compare by identity, mirroring how they are deduplicated.
impl PartialEq for Arg {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Entity(a), Self::Entity(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Self::Value(Value::from(s))
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Self::Value(Value::from(s))
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Self::Value(Value::from(n))
    }
}

impl<E: Entity> From<Arc<E>> for Arg {
    fn from(e: Arc<E>) -> Self {
        Self::Entity(e)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("No match for entity {0}")]
    NoMatch(EntityId),
}

/// Strategy for turning task arguments into values and back.
pub trait ArgumentCodec: Send + Sync {
    /// Replace entities with references. Already-encoded values pass through,
    /// so encoding is idempotent.
    fn encode(&self, args: &[Arg]) -> Vec<Value> {
        args.iter().map(Arg::encoded).collect()
    }

    fn decode(&self, args: &[Value]) -> Result<Vec<Arg>, CodecError>;
}

/// Codec for schedulers without domain entities: values come back exactly as
/// they were stored, entity references included.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityCodec;

impl ArgumentCodec for IdentityCodec {
    fn decode(&self, args: &[Value]) -> Result<Vec<Arg>, CodecError> {
        Ok(args.iter().cloned().map(Arg::Value).collect())
    }
}

/// Looks up live entities by id.
pub trait EntityResolver: Send + Sync {
    fn resolve(&self, id: &EntityId) -> Option<Arc<dyn Entity>>;
}

impl<R: EntityResolver + ?Sized> EntityResolver for Arc<R> {
    fn resolve(&self, id: &EntityId) -> Option<Arc<dyn Entity>> {
        (**self).resolve(id)
    }
}

/// Codec that resolves entity references through an [`EntityResolver`].
pub struct EntityCodec<R> {
    resolver: R,
}

impl<R: EntityResolver> EntityCodec<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }
}

impl<R: EntityResolver> ArgumentCodec for EntityCodec<R> {
    fn decode(&self, args: &[Value]) -> Result<Vec<Arg>, CodecError> {
        args.iter()
            .map(|value| match value {
                Value::EntityRef(id) => self
                    .resolver
                    .resolve(id)
                    .map(Arg::Entity)
                    .ok_or_else(|| CodecError::NoMatch(id.clone())),
                other => Ok(Arg::Value(other.clone())),
            })
            .collect()
    }
}
