use std::sync::{Arc, Mutex, PoisonError};

use oic::header::{HeaderOption, HeaderOptions, assemble_header_options};
use oic::query::{QueryParams, assemble_uri};
use oic::representation::{Representation, assemble_payload};
use oic::resource::ResourceHandle;
use oic::rest::RestKind;
use oic::status::Status;

use tracing::debug;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::stack::{OutboundRequest, Stack, StackEvent, Token};

/// A response to a `REST` request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: Status,
    header_options: HeaderOptions,
    representation: Option<Representation>,
}

impl Response {
    /// Returns the response [`Status`].
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Returns the header options sent back by the device.
    #[must_use]
    pub const fn header_options(&self) -> &HeaderOptions {
        &self.header_options
    }

    /// Returns the [`Representation`] carried by the response, if any.
    #[must_use]
    pub const fn representation(&self) -> Option<&Representation> {
        self.representation.as_ref()
    }

    /// Consumes the response and returns its [`Representation`].
    #[must_use]
    pub fn into_representation(self) -> Option<Representation> {
        self.representation
    }

    fn from_event(event: StackEvent) -> Result<Self> {
        if event.status.is_error() {
            return Err(Error::new(
                event.status,
                format!("The request {} failed", event.token),
            ));
        }

        let representation = match event.document.as_deref() {
            None | Some("") => None,
            Some(document) => Some(Representation::from_payload(document)?),
        };

        Ok(Self {
            status: event.status,
            header_options: event.header_options,
            representation,
        })
    }
}

type ResponseCallback = Box<dyn FnOnce(Result<Response>) + Send>;

// A request waiting for its response.
pub(crate) struct PendingRequest {
    callback: Mutex<Option<ResponseCallback>>,
}

impl PendingRequest {
    fn new(callback: impl FnOnce(Result<Response>) + Send + 'static) -> Self {
        let callback: ResponseCallback = Box::new(callback);
        Self {
            callback: Mutex::new(Some(callback)),
        }
    }

    pub(crate) fn complete(&self, event: StackEvent) {
        if let Some(callback) = self.take() {
            callback(Response::from_event(event));
        }
    }

    pub(crate) fn abandon(&self) {
        drop(self.take());
    }

    fn take(&self) -> Option<ResponseCallback> {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

// Query parameters are sent verbatim, hence they cannot contain separators.
pub(crate) fn check_query(query: &QueryParams) -> Result<()> {
    for (key, value) in query {
        let malformed = key.is_empty()
            || [key, value].iter().any(|part| {
                part.contains(['&', '=', '?', '#']) || part.contains(char::is_whitespace)
            });

        if malformed {
            return Err(Error::new(
                Status::InvalidQuery,
                format!("`{key}={value}` is not a valid query parameter"),
            ));
        }
    }
    Ok(())
}

impl<S: Stack> Client<S> {
    /// Reads the representation of a resource.
    ///
    /// The callback is invoked exactly once, on the listener thread, unless
    /// the client is stopped first.
    ///
    /// # Errors
    ///
    /// An error is returned, and the callback is never invoked, when the
    /// query parameters or the header options are invalid, or when the stack
    /// rejects the request.
    pub fn get_resource(
        &self,
        resource: &ResourceHandle,
        query: &QueryParams,
        header_options: &[HeaderOption],
        callback: impl FnOnce(Result<Response>) + Send + 'static,
    ) -> Result<Token> {
        self.send(RestKind::Get, resource, None, query, header_options, callback)
    }

    /// Replaces the representation of a resource.
    ///
    /// # Errors
    ///
    /// Same as [`Client::get_resource`], and when the representation cannot
    /// be serialized.
    pub fn put_resource(
        &self,
        resource: &ResourceHandle,
        representation: &Representation,
        query: &QueryParams,
        header_options: &[HeaderOption],
        callback: impl FnOnce(Result<Response>) + Send + 'static,
    ) -> Result<Token> {
        self.send(
            RestKind::Put,
            resource,
            Some(representation),
            query,
            header_options,
            callback,
        )
    }

    /// Sends a representation to a resource, usually to create a child
    /// resource or to trigger an action.
    ///
    /// # Errors
    ///
    /// Same as [`Client::put_resource`].
    pub fn post_resource(
        &self,
        resource: &ResourceHandle,
        representation: &Representation,
        query: &QueryParams,
        header_options: &[HeaderOption],
        callback: impl FnOnce(Result<Response>) + Send + 'static,
    ) -> Result<Token> {
        self.send(
            RestKind::Post,
            resource,
            Some(representation),
            query,
            header_options,
            callback,
        )
    }

    /// Deletes a resource.
    ///
    /// # Errors
    ///
    /// Same as [`Client::get_resource`].
    pub fn delete_resource(
        &self,
        resource: &ResourceHandle,
        query: &QueryParams,
        header_options: &[HeaderOption],
        callback: impl FnOnce(Result<Response>) + Send + 'static,
    ) -> Result<Token> {
        self.send(
            RestKind::Delete,
            resource,
            None,
            query,
            header_options,
            callback,
        )
    }

    fn send(
        &self,
        method: RestKind,
        resource: &ResourceHandle,
        representation: Option<&Representation>,
        query: &QueryParams,
        header_options: &[HeaderOption],
        callback: impl FnOnce(Result<Response>) + Send + 'static,
    ) -> Result<Token> {
        check_query(query)?;
        let header_options = assemble_header_options(header_options)?;
        // Only methods carrying a representation get a payload.
        let payload = match representation {
            Some(representation) if method.has_payload() => {
                Some(assemble_payload(representation)?)
            }
            _ => None,
        };

        let engine = self.engine();
        let request = OutboundRequest {
            method,
            host: resource.host().to_owned(),
            uri: assemble_uri(resource.path(), query),
            connectivity: resource.connectivity(),
            payload,
            header_options,
            quality_of_service: engine.config.quality_of_service,
        };

        let pending = Arc::new(PendingRequest::new(callback));
        let token = engine.register(Session::Request(pending), |stack| {
            stack.submit_request(request)
        })?;

        debug!("{method} request for {resource} sent with the token {token}");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use oic::header::{HeaderOption, MAX_HEADER_OPTIONS, assemble_header_options};
    use oic::query::QueryParams;
    use oic::representation::Representation;
    use oic::rest::RestKind;
    use oic::status::Status;

    use serde_json::{Value, json};

    use crate::channel::{events_channel, response_channel};
    use crate::error::Result;
    use crate::stack::StackEvent;
    use crate::tests::{Submitted, TIMEOUT, light, start_client, wait_until};

    use super::{Response, check_query};

    #[test]
    fn get_yields_one_callback() {
        let (_platform, control, client) = start_client();
        let count = Arc::new(AtomicUsize::new(0));

        let token = {
            let count = Arc::clone(&count);
            client
                .get_resource(&light(), &QueryParams::new(), &[], move |response| {
                    let response = response.unwrap();
                    assert_eq!(response.status(), Status::Ok);
                    assert!(
                        response
                            .representation()
                            .unwrap()
                            .get::<bool>("state")
                            .unwrap()
                    );
                    count.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        };
        assert_eq!(client.outstanding_operations(), 1);

        let document = json!({ "oc": [{ "href": "/a/light", "rep": { "state": true } }] });
        control.inject(StackEvent::new(token, Status::Ok).with_document(document.to_string()));
        // A duplicated response is ignored.
        control.inject(StackEvent::new(token, Status::Ok));

        wait_until(|| count.load(Ordering::SeqCst) == 1);
        control.wait_for_polls(2);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(client.outstanding_operations(), 0);
    }

    #[test]
    fn request_layout() {
        let (_platform, control, client) = start_client();

        let query = QueryParams::new()
            .insert("if".into(), "oic.if.baseline".into())
            .insert("rt".into(), "core.light".into());
        let options = [HeaderOption::new(2048, "first"), HeaderOption::new(3000, "second")];
        let representation = Representation::new()
            .with_uri("/a/light")
            .with_attribute("state", false)
            .unwrap();

        let token = client
            .put_resource(&light(), &representation, &query, &options, |_| {})
            .unwrap();

        let calls = control.calls();
        let (recorded, Submitted::Request(request)) = &calls[0] else {
            panic!("Unexpected stack call: {calls:?}");
        };

        assert_eq!(*recorded, token);
        assert_eq!(request.method, RestKind::Put);
        assert_eq!(request.host, light().host());
        assert_eq!(request.uri, "/a/light?if=oic.if.baseline&rt=core.light");
        assert_eq!(
            request.header_options,
            assemble_header_options(&options).unwrap()
        );

        let payload: Value = serde_json::from_str(request.payload.as_deref().unwrap()).unwrap();
        assert_eq!(
            payload,
            json!({ "oc": [{ "href": "/a/light", "rep": { "state": false } }] })
        );

        client
            .get_resource(&light(), &QueryParams::new(), &[], |_| {})
            .unwrap();
        client
            .delete_resource(&light(), &QueryParams::new(), &[], |_| {})
            .unwrap();
        let calls = control.calls();
        for (_, call) in &calls[1..] {
            let Submitted::Request(request) = call else {
                panic!("Unexpected stack call: {call:?}");
            };
            assert_eq!(request.payload, None);
        }
    }

    #[test]
    fn nested_children_are_rejected() {
        let (_platform, control, client) = start_client();

        let mut child = Representation::new().with_uri("/a/child");
        child.add_child(Representation::new().with_uri("/a/grandchild"));
        let mut root = Representation::new().with_uri("/a/root");
        root.add_child(child);

        let error = client
            .post_resource(&light(), &root, &QueryParams::new(), &[], |_| {})
            .unwrap_err();

        assert_eq!(error.status(), Status::InvalidParam);
        assert!(control.calls().is_empty());
        assert_eq!(client.outstanding_operations(), 0);
    }

    #[test]
    fn too_many_header_options() {
        let (_platform, control, client) = start_client();
        let options: Vec<_> = (0..=MAX_HEADER_OPTIONS)
            .map(|i| HeaderOption::new(2048 + i as u16, "value"))
            .collect();

        let error = client
            .get_resource(&light(), &QueryParams::new(), &options, |_| {
                unreachable!("A rejected request has no callback")
            })
            .unwrap_err();

        assert_eq!(error.status(), Status::InvalidParam);
        assert!(control.calls().is_empty());
        assert_eq!(client.outstanding_operations(), 0);
    }

    #[test]
    fn invalid_query() {
        let (_platform, control, client) = start_client();

        for (key, value) in [("", "value"), ("if", "a&b"), ("r t", "light"), ("rt", "a=b")] {
            let query = QueryParams::new().insert(key.into(), value.into());
            let error = client
                .get_resource(&light(), &query, &[], |_| {})
                .unwrap_err();
            assert_eq!(error.status(), Status::InvalidQuery);
        }

        assert!(control.calls().is_empty());
        assert!(check_query(&QueryParams::new()).is_ok());
    }

    #[test]
    fn stack_rejection() {
        let (_platform, control, client) = start_client();
        control.fail_next(Status::CommError);

        let error = client
            .delete_resource(&light(), &QueryParams::new(), &[], |_| {})
            .unwrap_err();

        assert_eq!(error.status(), Status::CommError);
        assert_eq!(client.outstanding_operations(), 0);
    }

    #[test]
    fn failed_response() {
        let (_platform, control, client) = start_client();
        let (callback, response) = response_channel::<Response>();

        let token = client
            .post_resource(
                &light(),
                &Representation::new(),
                &QueryParams::new(),
                &[],
                callback,
            )
            .unwrap();
        control.inject(StackEvent::new(token, Status::ResourceError));

        let error = response.wait(TIMEOUT).unwrap_err();
        assert_eq!(error.status(), Status::ResourceError);
    }

    #[test]
    fn deleted_response() {
        let (_platform, control, client) = start_client();
        let (callback, response) = response_channel::<Response>();

        let token = client
            .delete_resource(&light(), &QueryParams::new(), &[], callback)
            .unwrap();
        let options = assemble_header_options(&[HeaderOption::new(2050, "echo")]).unwrap();
        control.inject(StackEvent::new(token, Status::Deleted).with_header_options(options.clone()));

        let response = response.wait(TIMEOUT).unwrap();
        assert_eq!(response.status(), Status::Deleted);
        assert_eq!(response.header_options(), &options);
        assert!(response.representation().is_none());
    }

    #[test]
    fn malformed_response() {
        let (_platform, control, client) = start_client();
        let (callback, response) = response_channel::<Response>();

        let token = client
            .get_resource(&light(), &QueryParams::new(), &[], callback)
            .unwrap();
        control.inject(StackEvent::new(token, Status::Ok).with_document("{ not json"));

        assert_eq!(
            response.wait(TIMEOUT).unwrap_err().status(),
            Status::GenericError
        );
    }

    #[test]
    fn concurrent_requests() {
        let (_platform, control, client) = start_client();
        let client = Arc::new(client);
        let (callback, responses) = events_channel::<(RestKind, Result<Response>)>();

        let senders: Vec<_> = [RestKind::Get, RestKind::Put]
            .into_iter()
            .map(|method| {
                let client = Arc::clone(&client);
                let callback = callback.clone();
                thread::spawn(move || {
                    let callback = move |response: Result<Response>| callback((method, response));
                    match method {
                        RestKind::Get => client.get_resource(
                            &light(),
                            &QueryParams::new(),
                            &[],
                            callback,
                        ),
                        _ => client.put_resource(
                            &light(),
                            &Representation::new(),
                            &QueryParams::new(),
                            &[],
                            callback,
                        ),
                    }
                    .unwrap()
                })
            })
            .collect();

        let tokens: Vec<_> = senders
            .into_iter()
            .map(|sender| sender.join().unwrap())
            .collect();
        assert_ne!(tokens[0], tokens[1]);

        for token in &tokens {
            control.inject(StackEvent::new(*token, Status::Ok));
        }

        let mut methods: Vec<_> = (0..2)
            .map(|_| {
                let (method, response) = responses.recv_timeout(TIMEOUT).unwrap();
                assert!(response.is_ok());
                method
            })
            .collect();
        methods.sort_by_key(|method| method.to_string());
        assert_eq!(methods, [RestKind::Get, RestKind::Put]);

        control.wait_for_polls(2);
        assert!(responses.is_empty());
    }
}
