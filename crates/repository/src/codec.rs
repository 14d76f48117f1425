//! Conversion between entities and wire documents.
//!
//! Entities travel to and from the engine as JSON objects. The codec also
//! handles the two field-level operations the repository needs: overwriting
//! a single field with a highlighted fragment, and reading the identifier
//! field through the descriptor.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::descriptor::EntityDescriptor;
use crate::error::{CodecError, RepositoryError, RepositoryResult};

/// Serializes and deserializes one entity type, bound to its descriptor.
#[derive(Debug)]
pub struct DocumentCodec<T> {
    descriptor: Arc<EntityDescriptor<T>>,
}

impl<T> DocumentCodec<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    /// A codec bound to the given descriptor.
    pub fn new(descriptor: Arc<EntityDescriptor<T>>) -> Self {
        Self { descriptor }
    }

    /// The descriptor this codec reads the identifier field through.
    pub fn descriptor(&self) -> &EntityDescriptor<T> {
        &self.descriptor
    }

    /// Serializes an entity into its wire document. Total over well-formed
    /// entities; no fields are dropped.
    pub fn encode(&self, entity: &T) -> Result<Value, CodecError> {
        let document = serde_json::to_value(entity).map_err(|e| CodecError::Encode {
            message: e.to_string(),
        })?;
        if !document.is_object() {
            return Err(CodecError::NotAnObject);
        }
        Ok(document)
    }

    /// Deserializes a wire document back into an entity.
    pub fn decode(&self, document: Value) -> Result<T, CodecError> {
        serde_json::from_value(document).map_err(|e| CodecError::Decode {
            message: e.to_string(),
        })
    }

    /// Overwrites one named field with a string value, in place.
    ///
    /// Used to inject highlighted fragments into an already-decoded entity.
    /// Fails when the field does not exist on the entity or cannot hold a
    /// string.
    pub fn merge_field(&self, entity: &mut T, field: &str, value: &str) -> Result<(), CodecError> {
        let mut document = self.encode(entity)?;
        let object = match document.as_object_mut() {
            Some(object) => object,
            None => return Err(CodecError::NotAnObject),
        };

        match object.get_mut(field) {
            Some(slot) => *slot = Value::String(value.to_string()),
            None => {
                return Err(CodecError::UnknownField {
                    field: field.to_string(),
                });
            }
        }

        *entity = self
            .decode(document)
            .map_err(|e| CodecError::NotAssignable {
                field: field.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Reads the identifier field and returns its string form.
    ///
    /// An unset (null) identifier is an invalid-entity error, raised before
    /// any network call is issued.
    pub fn extract_id(&self, entity: &T) -> RepositoryResult<String> {
        let field = self.descriptor.id_field();
        let document = self.encode(entity)?;

        match document.get(field) {
            None | Some(Value::Null) => Err(RepositoryError::InvalidEntity {
                message: format!("identifier field '{field}' is unset"),
            }),
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            Some(Value::Bool(id)) => Ok(id.to_string()),
            Some(_) => Err(RepositoryError::InvalidEntity {
                message: format!("identifier field '{field}' is not a scalar value"),
            }),
        }
    }
}
