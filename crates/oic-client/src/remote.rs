use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use oic::query::QueryParams;
use oic::representation::Representation;
use oic::resource::ResourceDescriptor;
use oic::status::Status;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::observe::{Notification, ObserveHandle, ObserveKind};
use crate::request::Response;
use crate::stack::{Stack, Token};

/// A discovered resource bound to the [`Client`] reaching it.
///
/// It offers the resource operations without repeating the resource
/// address at each call, and it keeps track of its own observation.
pub struct RemoteResource<S: Stack> {
    client: Arc<Client<S>>,
    descriptor: ResourceDescriptor,
    observation: Mutex<Option<ObserveHandle>>,
}

impl<S: Stack> std::fmt::Debug for RemoteResource<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteResource")
            .field("descriptor", &self.descriptor)
            .field("observing", &self.is_observing())
            .finish_non_exhaustive()
    }
}

impl<S: Stack> RemoteResource<S> {
    /// Creates a [`RemoteResource`].
    #[must_use]
    pub const fn new(client: Arc<Client<S>>, descriptor: ResourceDescriptor) -> Self {
        Self {
            client,
            descriptor,
            observation: Mutex::new(None),
        }
    }

    /// Returns the resource identity, its host followed by its path.
    #[must_use]
    pub fn id(&self) -> String {
        self.descriptor.handle().to_string()
    }

    /// Returns the [`ResourceDescriptor`].
    #[must_use]
    pub const fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Reads the resource, optionally through one of its interfaces.
    ///
    /// # Errors
    ///
    /// An [`Status::InvalidParam`] error is returned when the resource does
    /// not expose the interface. An error is also returned when the request
    /// cannot be sent.
    pub fn get(
        &self,
        interface: Option<&str>,
        callback: impl FnOnce(Result<Response>) + Send + 'static,
    ) -> Result<Token> {
        let query = self.query(interface)?;
        self.client
            .get_resource(&self.descriptor.handle(), &query, &[], callback)
    }

    /// Replaces the resource state, optionally through one of its
    /// interfaces.
    ///
    /// # Errors
    ///
    /// Same as [`RemoteResource::get`].
    pub fn put(
        &self,
        representation: &Representation,
        interface: Option<&str>,
        callback: impl FnOnce(Result<Response>) + Send + 'static,
    ) -> Result<Token> {
        let query = self.query(interface)?;
        self.client.put_resource(
            &self.descriptor.handle(),
            representation,
            &query,
            &[],
            callback,
        )
    }

    /// Updates the resource state, optionally through one of its
    /// interfaces.
    ///
    /// # Errors
    ///
    /// Same as [`RemoteResource::get`].
    pub fn post(
        &self,
        representation: &Representation,
        interface: Option<&str>,
        callback: impl FnOnce(Result<Response>) + Send + 'static,
    ) -> Result<Token> {
        let query = self.query(interface)?;
        self.client.post_resource(
            &self.descriptor.handle(),
            representation,
            &query,
            &[],
            callback,
        )
    }

    /// Starts observing the resource.
    ///
    /// # Errors
    ///
    /// A [`Status::GenericError`] error is returned when the resource is
    /// already being observed. An error is also returned when the
    /// observation cannot be registered.
    pub fn observe(
        &self,
        kind: ObserveKind,
        callback: impl FnMut(Result<Notification>) + Send + 'static,
    ) -> Result<()> {
        let mut observation = self.observation();
        if observation
            .as_ref()
            .is_some_and(ObserveHandle::is_observing)
        {
            return Err(Error::new(
                Status::GenericError,
                format!("The resource {} is already observed", self.id()),
            ));
        }

        let handle = self.client.observe_resource(
            kind,
            &self.descriptor.handle(),
            &QueryParams::new(),
            &[],
            callback,
        )?;
        *observation = Some(handle);

        Ok(())
    }

    /// Stops observing the resource.
    ///
    /// # Errors
    ///
    /// A [`Status::NoResource`] error is returned when the resource is not
    /// being observed.
    pub fn cancel_observe(&self) -> Result<()> {
        let Some(handle) = self.observation().take() else {
            return Err(Error::new(
                Status::NoResource,
                format!("The resource {} is not observed", self.id()),
            ));
        };

        self.client.cancel_observe_resource(&handle, &[])
    }

    /// Checks whether the resource is being observed.
    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.observation()
            .as_ref()
            .is_some_and(ObserveHandle::is_observing)
    }

    fn observation(&self) -> MutexGuard<'_, Option<ObserveHandle>> {
        self.observation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn query(&self, interface: Option<&str>) -> Result<QueryParams> {
        let Some(interface) = interface else {
            return Ok(QueryParams::new());
        };

        let interfaces = self.descriptor.interfaces();
        if !interfaces.is_empty() && !interfaces.contains(interface) {
            return Err(Error::new(
                Status::InvalidParam,
                format!(
                    "The resource {} does not expose the interface `{interface}`",
                    self.id()
                ),
            ));
        }

        Ok(QueryParams::new().insert("if".into(), interface.into()))
    }
}
