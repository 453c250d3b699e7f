use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::macros::map;
use crate::resource::{Interfaces, ResourceTypes, string_list};
use crate::status::Status;

map! {
  /// The attributes of a [`Representation`], in insertion order.
  #[derive(Debug, Clone, PartialEq)]
  pub struct Attributes(IndexMap<String, Value, DefaultHashBuilder>);
}

impl Attributes {
    /// Retrieves the value associated with the given attribute name.
    #[must_use]
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

/// The state of a resource.
///
/// A representation is made of the resource `URI`, its types and interfaces,
/// a set of named attributes, and optionally the representations of child
/// resources.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Representation {
    uri: String,
    resource_types: ResourceTypes,
    interfaces: Interfaces,
    attributes: Attributes,
    children: Vec<Representation>,
}

impl Representation {
    /// Creates an empty [`Representation`].
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the resource `URI`.
    #[must_use]
    #[inline]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Sets the [`ResourceTypes`].
    #[must_use]
    #[inline]
    pub fn with_resource_types(mut self, resource_types: ResourceTypes) -> Self {
        self.resource_types = resource_types;
        self
    }

    /// Sets the [`Interfaces`].
    #[must_use]
    #[inline]
    pub fn with_interfaces(mut self, interfaces: Interfaces) -> Self {
        self.interfaces = interfaces;
        self
    }

    /// Adds an attribute, returning the updated [`Representation`].
    ///
    /// # Errors
    ///
    /// An error is returned when the value cannot be serialized.
    #[inline]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Serialize) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Sets an attribute.
    ///
    /// An existing attribute keeps its position and takes the new value.
    ///
    /// # Errors
    ///
    /// An error is returned when the value cannot be serialized.
    pub fn set(&mut self, name: impl Into<String>, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.attributes.add(name.into(), value);
        Ok(())
    }

    /// Retrieves an attribute, converting it to the requested type.
    ///
    /// # Errors
    ///
    /// An [`Status::NoResource`] error is returned when the attribute does
    /// not exist, an [`Status::InvalidParam`] error when its value has a
    /// different type.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.attributes.get(name).ok_or_else(|| {
            Error::new(
                Status::NoResource,
                format!("The attribute `{name}` does not exist"),
            )
        })?;

        T::deserialize(value).map_err(|e| {
            Error::new(
                Status::InvalidParam,
                format!("The attribute `{name}` has an unexpected type: {e}"),
            )
        })
    }

    /// Checks whether the given attribute exists.
    #[must_use]
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.get(name).is_some()
    }

    /// Adds the representation of a child resource.
    #[inline]
    pub fn add_child(&mut self, child: Self) {
        self.children.push(child);
    }

    /// Returns the resource `URI`.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns the resource types.
    #[must_use]
    pub const fn resource_types(&self) -> &ResourceTypes {
        &self.resource_types
    }

    /// Returns the resource interfaces.
    #[must_use]
    pub const fn interfaces(&self) -> &Interfaces {
        &self.interfaces
    }

    /// Returns the attributes.
    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns the representations of child resources.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Parses a response payload into a [`Representation`].
    ///
    /// A payload is either a single representation object or an envelope
    /// listing representations under `oc`: the first one describes the
    /// resource itself, the following ones its children.
    ///
    /// # Errors
    ///
    /// An error is returned when the payload is not valid `JSON` or has an
    /// unexpected structure.
    pub fn from_payload(payload: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(payload)?;

        match payload.get("oc") {
            Some(Value::Array(items)) => {
                let mut items = items.iter();
                let Some(first) = items.next() else {
                    return Ok(Self::default());
                };

                let mut representation = Self::from_value(first)?;
                for item in items {
                    representation.add_child(Self::from_value(item)?);
                }
                Ok(representation)
            }
            Some(_) => Err(malformed("`oc` must be an array of representations")),
            None => Self::from_value(&payload),
        }
    }

    fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| malformed("A representation must be an object"))?;

        let uri = match object.get("href") {
            None => String::new(),
            Some(Value::String(uri)) => uri.clone(),
            Some(_) => return Err(malformed("`href` must be a string")),
        };

        let (resource_types, interfaces) = match object.get("prop") {
            None => (ResourceTypes::new(), Interfaces::new()),
            Some(Value::Object(properties)) => (
                string_list(properties, "rt")?,
                string_list(properties, "if")?,
            ),
            Some(_) => return Err(malformed("`prop` must be an object")),
        };

        let mut attributes = Attributes::new();
        match object.get("rep") {
            None => {}
            Some(Value::Object(rep)) => {
                for (name, value) in rep {
                    attributes.add(name.clone(), value.clone());
                }
            }
            Some(_) => return Err(malformed("`rep` must be an object")),
        }

        Ok(Self {
            uri,
            resource_types,
            interfaces,
            attributes,
            children: Vec::new(),
        })
    }

    fn to_value(&self) -> Value {
        let mut object = Map::new();

        if !self.uri.is_empty() {
            object.insert("href".into(), Value::String(self.uri.clone()));
        }

        let mut properties = Map::new();
        if !self.resource_types.is_empty() {
            properties.insert("rt".into(), strings(&self.resource_types));
        }
        if !self.interfaces.is_empty() {
            properties.insert("if".into(), strings(&self.interfaces));
        }
        if !properties.is_empty() {
            object.insert("prop".into(), Value::Object(properties));
        }

        let rep = self
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        object.insert("rep".into(), Value::Object(rep));

        Value::Object(object)
    }
}

fn strings<'a>(values: impl IntoIterator<Item = &'a String>) -> Value {
    Value::Array(values.into_iter().cloned().map(Value::String).collect())
}

fn malformed(description: &'static str) -> Error {
    Error::new(Status::GenericError, description)
}

/// Serializes a [`Representation`] into the payload of a write request.
///
/// The payload lists the representation, followed by its children, under
/// `oc`. The envelope is flat, so children cannot have children of their
/// own.
///
/// # Errors
///
/// An [`Status::InvalidParam`] error is returned when a child has children.
/// An error is also returned when the payload cannot be serialized.
pub fn assemble_payload(representation: &Representation) -> Result<String> {
    if let Some(child) = representation
        .children
        .iter()
        .find(|child| !child.children.is_empty())
    {
        return Err(Error::new(
            Status::InvalidParam,
            format!(
                "The child `{}` has children, which a payload cannot carry",
                child.uri
            ),
        ));
    }

    let items = core::iter::once(representation)
        .chain(representation.children.iter())
        .map(Representation::to_value)
        .collect();

    let mut envelope = Map::new();
    envelope.insert("oc".into(), Value::Array(items));

    Ok(serde_json::to_string(&Value::Object(envelope))?)
}
