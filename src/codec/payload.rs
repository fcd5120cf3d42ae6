//! Type-erased payloads carried inside wire frames.
//!
//! Every `Serialize + DeserializeOwned + Default` type is a [`Payload`]
//! through the blanket impl, serialized with [`MsgPackCodec`]. Types that
//! need a different format implement the trait by hand.

use std::any::Any;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::MsgPackCodec;
use crate::error::Result;

/// A message body that can be framed by type id.
pub trait Payload: Any + Send + Sync + fmt::Debug {
    /// Canonical name used as the registry key.
    fn type_name(&self) -> &'static str;

    /// Serialize the body.
    fn marshal(&self) -> Result<Vec<u8>>;

    /// Deserialize `bytes` into `self`.
    fn unmarshal(&mut self, bytes: &[u8]) -> Result<()>;

    /// Upcast for downcasting by reference.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for downcasting by value.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T> Payload for T
where
    T: Serialize + DeserializeOwned + Default + fmt::Debug + Send + Sync + 'static,
{
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        MsgPackCodec::encode(self)
    }

    fn unmarshal(&mut self, bytes: &[u8]) -> Result<()> {
        MsgPackCodec::decode_into(bytes, self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

impl dyn Payload {
    /// Check the concrete type.
    pub fn is<T: Payload>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrow as the concrete type.
    pub fn downcast_ref<T: Payload>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Take ownership as the concrete type.
    pub fn downcast<T: Payload>(self: Box<Self>) -> Option<Box<T>> {
        self.into_any().downcast::<T>().ok()
    }
}
