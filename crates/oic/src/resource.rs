use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::warn;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::connectivity::ConnectivityType;
use crate::error::{Error, Result};
use crate::macros::set;
use crate::status::Status;

/// The resource can be discovered.
pub const DISCOVERABLE: u8 = 0x01;
/// The resource accepts observers.
pub const OBSERVABLE: u8 = 0x02;
/// The resource is active.
pub const ACTIVE: u8 = 0x04;
/// The resource answers slowly.
pub const SLOW: u8 = 0x08;
/// The resource requires a secure channel.
pub const SECURE: u8 = 0x10;

set! {
  /// Resource types of a resource.
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  pub struct ResourceTypes(IndexSet<String, DefaultHashBuilder>);
}

set! {
  /// Interfaces exposed by a resource.
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  pub struct Interfaces(IndexSet<String, DefaultHashBuilder>);
}

fn malformed(description: impl Into<alloc::borrow::Cow<'static, str>>) -> Error {
    Error::new(Status::GenericError, description)
}

fn invalid_uri(description: impl Into<alloc::borrow::Cow<'static, str>>) -> Error {
    Error::new(Status::InvalidUri, description)
}

fn check_host(host: &str) -> Result<()> {
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(invalid_uri(format!("`{host}` is not a valid host")));
    }
    Ok(())
}

fn check_path(path: &str) -> Result<()> {
    if !path.starts_with('/') || path.contains(['?', '#']) || path.contains(char::is_whitespace) {
        return Err(invalid_uri(format!("`{path}` is not a valid resource path")));
    }
    Ok(())
}

// A list field is either a single string or an array of strings.
pub(crate) fn string_list<T>(object: &Map<String, Value>, field: &str) -> Result<T>
where
    T: FromIterator<String>,
{
    match object.get(field) {
        None | Some(Value::Null) => Ok(core::iter::empty().collect()),
        Some(Value::String(value)) => Ok(core::iter::once(value.clone()).collect()),
        Some(Value::Array(values)) => values
            .iter()
            .map(|value| {
                value
                    .as_str()
                    .map(ToString::to_string)
                    .ok_or_else(|| malformed(format!("`{field}` contains a non-string entry")))
            })
            .collect(),
        Some(_) => Err(malformed(format!(
            "`{field}` must be a string or an array of strings"
        ))),
    }
}

/// The identity of a resource.
///
/// A resource is identified by the host exposing it, its path on that host,
/// and the transport family used to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    host: String,
    path: String,
    connectivity: ConnectivityType,
}

impl ResourceHandle {
    /// Creates a [`ResourceHandle`] from a known host and path.
    ///
    /// # Errors
    ///
    /// An [`Status::InvalidUri`] error is returned when the host is empty or
    /// when the path is not absolute.
    pub fn new(
        host: impl Into<String>,
        path: impl Into<String>,
        connectivity: ConnectivityType,
    ) -> Result<Self> {
        let host = host.into();
        let path = path.into();

        check_host(&host)?;
        check_path(&path)?;

        Ok(Self {
            host,
            path,
            connectivity,
        })
    }

    /// Returns the resource host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the resource path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the resource [`ConnectivityType`].
    #[must_use]
    pub const fn connectivity(&self) -> ConnectivityType {
        self.connectivity
    }
}

impl core::fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}{}", self.host, self.path)
    }
}

/// A parsed view of a resource.
///
/// A descriptor is built once per discovery announcement and handed over to
/// the caller, who owns it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDescriptor {
    handle: ResourceHandle,
    resource_types: ResourceTypes,
    interfaces: Interfaces,
    policy: u8,
    secure_port: Option<u16>,
}

impl ResourceDescriptor {
    /// Creates a [`ResourceDescriptor`] for a known [`ResourceHandle`],
    /// without types, interfaces, or policies.
    #[must_use]
    pub fn from_handle(handle: ResourceHandle) -> Self {
        Self {
            handle,
            resource_types: ResourceTypes::new(),
            interfaces: Interfaces::new(),
            policy: 0,
            secure_port: None,
        }
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

    /// Sets the policy bitmask.
    #[must_use]
    pub const fn with_policy(mut self, policy: u8) -> Self {
        self.policy = policy;
        self
    }

    /// Parses a single resource object of a discovery document.
    ///
    /// The `origin` address, when present, is the host the announcement
    /// came from and takes precedence over the `host` field of the document.
    /// Resource types, interfaces, and policies are read from the `prop`
    /// object when it lists them, otherwise from the top level. A truthy
    /// `prop.obs` marks the resource as observable. Unknown fields are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Parsing fails when the document is not an object, when the path
    /// (`href`) or the host are missing or invalid, and when a known field
    /// has an unexpected type.
    pub fn parse(
        document: &Value,
        origin: Option<&str>,
        connectivity: ConnectivityType,
    ) -> Result<Self> {
        let object = document
            .as_object()
            .ok_or_else(|| malformed("A resource document must be an object"))?;

        let path = match object.get("href") {
            Some(Value::String(path)) => path.clone(),
            Some(_) => return Err(malformed("`href` must be a string")),
            None => return Err(invalid_uri("The resource path (`href`) is missing")),
        };

        let host = match (origin, object.get("host")) {
            (Some(origin), _) if !origin.is_empty() => origin.to_string(),
            (_, Some(Value::String(host))) => host.clone(),
            (_, Some(_)) => return Err(malformed("`host` must be a string")),
            _ => return Err(invalid_uri(format!("No host is known for `{path}`"))),
        };

        let properties = match object.get("prop") {
            None | Some(Value::Null) => None,
            Some(Value::Object(properties)) => Some(properties),
            Some(_) => return Err(malformed("`prop` must be an object")),
        };

        let handle = ResourceHandle::new(host, path, connectivity)?;
        let resource_types = string_list(holder(properties, object, "rt"), "rt")?;
        let interfaces = string_list(holder(properties, object, "if"), "if")?;
        let (mut policy, secure_port) = parse_policy(holder(properties, object, "p").get("p"))?;

        match properties.and_then(|properties| properties.get("obs")) {
            None | Some(Value::Null) => {}
            Some(value) => match value.as_bool().or_else(|| value.as_u64().map(|obs| obs != 0)) {
                Some(true) => policy |= OBSERVABLE,
                Some(false) => {}
                None => return Err(malformed("`prop.obs` must be a boolean or an integer")),
            },
        }

        Ok(Self {
            handle,
            resource_types,
            interfaces,
            policy,
            secure_port,
        })
    }

    /// Returns the [`ResourceHandle`] used to address this resource.
    #[must_use]
    pub fn handle(&self) -> ResourceHandle {
        self.handle.clone()
    }

    /// Returns the resource host.
    #[must_use]
    pub fn host(&self) -> &str {
        self.handle.host()
    }

    /// Returns the resource path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.handle.path()
    }

    /// Returns the resource [`ConnectivityType`].
    #[must_use]
    pub const fn connectivity(&self) -> ConnectivityType {
        self.handle.connectivity()
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

    /// Checks whether the resource can be discovered.
    #[must_use]
    pub const fn is_discoverable(&self) -> bool {
        self.policy & DISCOVERABLE != 0
    }

    /// Checks whether the resource accepts observers.
    #[must_use]
    pub const fn is_observable(&self) -> bool {
        self.policy & OBSERVABLE != 0
    }

    /// Checks whether the resource requires a secure channel.
    #[must_use]
    pub const fn is_secure(&self) -> bool {
        self.policy & SECURE != 0
    }

    /// Returns the port of the secure channel, if announced.
    #[must_use]
    pub const fn secure_port(&self) -> Option<u16> {
        self.secure_port
    }
}

// Fields nested under `prop` take precedence over top-level ones.
fn holder<'a>(
    properties: Option<&'a Map<String, Value>>,
    object: &'a Map<String, Value>,
    field: &str,
) -> &'a Map<String, Value> {
    properties
        .filter(|properties| properties.contains_key(field))
        .unwrap_or(object)
}

fn parse_policy(policy: Option<&Value>) -> Result<(u8, Option<u16>)> {
    let object = match policy {
        None | Some(Value::Null) => return Ok((0, None)),
        Some(Value::Object(object)) => object,
        Some(_) => return Err(malformed("`p` must be an object")),
    };

    let mut bits = match object.get("bm") {
        None => 0,
        Some(value) => value
            .as_u64()
            .and_then(|bits| u8::try_from(bits).ok())
            .ok_or_else(|| malformed("`p.bm` must be an 8-bit unsigned integer"))?,
    };

    match object.get("sec") {
        None | Some(Value::Bool(false)) => {}
        Some(Value::Bool(true)) => bits |= SECURE,
        Some(_) => return Err(malformed("`p.sec` must be a boolean")),
    }

    let secure_port = match object.get("port") {
        None => None,
        Some(value) => Some(
            value
                .as_u64()
                .and_then(|port| u16::try_from(port).ok())
                .ok_or_else(|| malformed("`p.port` must be a port number"))?,
        ),
    };

    Ok((bits, secure_port))
}

/// Parses a discovery document into descriptors.
///
/// A document is either a single resource object or an envelope listing
/// several resources under `oc`. Each resource is parsed on its own, so a
/// malformed resource does not prevent the others from being returned.
///
/// # Errors
///
/// An error is returned when the document is not valid `JSON` or has
/// neither shape.
pub fn parse_discovery_document(
    document: &str,
    origin: Option<&str>,
    connectivity: ConnectivityType,
) -> Result<Vec<Result<ResourceDescriptor>>> {
    let document: Value = serde_json::from_str(document)?;

    match document.get("oc") {
        Some(Value::Array(resources)) => Ok(resources
            .iter()
            .map(|resource| {
                let descriptor = ResourceDescriptor::parse(resource, origin, connectivity);
                if let Err(e) = &descriptor {
                    warn!("Skipping a resource of a discovery document: {e}");
                }
                descriptor
            })
            .collect()),
        Some(_) => Err(malformed("`oc` must be an array of resources")),
        None if document.is_object() => Ok(alloc::vec![ResourceDescriptor::parse(
            &document,
            origin,
            connectivity
        )]),
        None => Err(malformed("A discovery document must be an object")),
    }
}
