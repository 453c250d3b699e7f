use std::sync::Arc;
use std::thread::ThreadId;

use hashbrown::HashSet;

use oic::connectivity::ConnectivityType;
use oic::query::{QueryParams, assemble_uri};
use oic::resource::{ResourceDescriptor, ResourceHandle, parse_discovery_document};
use oic::status::Status;

use tracing::{debug, warn};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::session::{Gate, Session};
use crate::stack::{DiscoveryRequest, Stack, StackEvent};

type FindCallback = Box<dyn FnMut(ResourceDescriptor) + Send>;

struct Finder {
    callback: FindCallback,
    // Resources already reported, when duplicates are filtered out.
    seen: Option<HashSet<ResourceHandle>>,
}

// A discovery listen. It lasts as long as the client.
pub(crate) struct DiscoverySession {
    gate: Gate<Finder>,
}

impl DiscoverySession {
    pub(crate) fn close(&self, listener: ThreadId) {
        self.gate.close(listener);
    }

    pub(crate) fn announce(&self, event: StackEvent, connectivity: ConnectivityType) {
        if !event.status.is_ok() {
            warn!(
                "Ignoring a discovery announcement with status `{}`",
                event.status
            );
            return;
        }

        let Some(document) = event.document.as_deref().filter(|document| !document.is_empty())
        else {
            warn!("Ignoring an empty discovery announcement");
            return;
        };

        let (origin, connectivity) = match &event.origin {
            Some(origin) => (Some(origin.host.as_str()), origin.connectivity),
            None => (None, connectivity),
        };

        let descriptors = match parse_discovery_document(document, origin, connectivity) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                warn!("Ignoring a malformed discovery announcement: {e}");
                return;
            }
        };

        self.gate.deliver(|finder| {
            // Malformed resources have already been reported by the parser.
            for descriptor in descriptors.into_iter().flatten() {
                if let Some(seen) = &mut finder.seen
                    && !seen.insert(descriptor.handle())
                {
                    debug!("The resource {} has already been reported", descriptor.handle());
                    continue;
                }

                (finder.callback)(descriptor);
            }
        });
    }
}

fn check_filters(service_filter: &str, resource_type_filter: &str) -> Result<()> {
    if service_filter.contains(char::is_whitespace) {
        return Err(Error::new(
            Status::InvalidUri,
            format!("`{service_filter}` is not a valid host"),
        ));
    }

    if resource_type_filter.contains(['&', '=', '?', '#'])
        || resource_type_filter.contains(char::is_whitespace)
    {
        return Err(Error::new(
            Status::InvalidQuery,
            format!("`{resource_type_filter}` is not a valid resource type filter"),
        ));
    }

    Ok(())
}

impl<S: Stack> Client<S> {
    /// Listens for resources.
    ///
    /// The `service_filter` is the host to query, an empty filter queries
    /// every reachable host. The `resource_type_filter` restricts the
    /// discovery to a resource type, an empty filter accepts every type.
    ///
    /// The callback is invoked on the listener thread once for every
    /// discovered resource, for the whole life of the client. Unless
    /// [`ClientConfig::keep_duplicates`](crate::config::ClientConfig::keep_duplicates)
    /// has been set, a resource already reported by this listen is not
    /// reported again. Malformed announcements are logged and skipped.
    ///
    /// # Errors
    ///
    /// An error is returned, and the callback is never invoked, when a
    /// filter is malformed or when the stack rejects the discovery request.
    pub fn listen_for_resource(
        &self,
        service_filter: &str,
        resource_type_filter: &str,
        callback: impl FnMut(ResourceDescriptor) + Send + 'static,
    ) -> Result<()> {
        check_filters(service_filter, resource_type_filter)?;

        let engine = self.engine();
        let query = if resource_type_filter.is_empty() {
            QueryParams::new()
        } else {
            QueryParams::new().insert("rt".into(), resource_type_filter.into())
        };

        let request = DiscoveryRequest {
            host: (!service_filter.is_empty()).then(|| service_filter.to_owned()),
            uri: assemble_uri(&engine.config.discovery_uri, &query),
            connectivity: engine.config.connectivity,
            quality_of_service: engine.config.quality_of_service,
        };

        let callback: FindCallback = Box::new(callback);
        let session = Arc::new(DiscoverySession {
            gate: Gate::new(Finder {
                callback,
                seen: engine.config.deduplicate_discovery.then(HashSet::new),
            }),
        });
        let token = engine.register(Session::Discovery(session), |stack| {
            stack.initiate_discovery(request)
        })?;

        debug!("Listening for resources with the token {token}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use oic::connectivity::ConnectivityType;
    use oic::resource::ResourceDescriptor;
    use oic::status::Status;

    use serde_json::json;

    use crate::channel::events_channel;
    use crate::client::Client;
    use crate::platform::Platform;
    use crate::stack::{Origin, StackEvent, Token};
    use crate::tests::{
        MockControl, MockStack, Submitted, TIMEOUT, init_tracing, start_client, test_config,
    };

    fn announce(control: &MockControl, token: Token, host: &str, document: &serde_json::Value) {
        control.inject(
            StackEvent::new(token, Status::Ok)
                .with_document(document.to_string())
                .with_origin(Origin::new(host, ConnectivityType::Ipv4)),
        );
    }

    #[test]
    fn one_callback_per_resource() {
        let (_platform, control, client) = start_client();
        let (callback, descriptors) = events_channel::<ResourceDescriptor>();

        client
            .listen_for_resource("", "core.light", callback)
            .unwrap();

        let (token, Submitted::Discovery(request)) = control.calls()[0].clone() else {
            panic!("A discovery request was expected");
        };
        assert_eq!(request.host, None);
        assert_eq!(request.uri, "/oc/core?rt=core.light");

        let hosts = ["coap://10.0.0.1", "coap://10.0.0.2", "coap://10.0.0.3"];
        for host in hosts {
            announce(
                &control,
                token,
                host,
                &json!({ "href": "/a/light", "rt": ["core.light"], "p": { "bm": 3 } }),
            );
        }

        for host in hosts {
            let descriptor = descriptors.recv_timeout(TIMEOUT).unwrap();
            assert_eq!(descriptor.host(), host);
            assert_eq!(descriptor.path(), "/a/light");
            assert_eq!(descriptor.connectivity(), ConnectivityType::Ipv4);
            assert!(descriptor.is_observable());
        }

        control.wait_for_polls(2);
        assert!(descriptors.is_empty());
    }

    #[test]
    fn envelope_and_malformed_announcements() {
        let (_platform, control, client) = start_client();
        let (callback, descriptors) = events_channel::<ResourceDescriptor>();

        client
            .listen_for_resource("coap://10.0.0.1", "", callback)
            .unwrap();
        let (token, Submitted::Discovery(request)) = control.calls()[0].clone() else {
            panic!("A discovery request was expected");
        };
        assert_eq!(request.host.as_deref(), Some("coap://10.0.0.1"));
        assert_eq!(request.uri, "/oc/core");

        control.inject(StackEvent::new(token, Status::Ok).with_document("{ not json"));
        control.inject(StackEvent::new(token, Status::Ok));
        control.inject(StackEvent::new(token, Status::CommError));
        announce(
            &control,
            token,
            "coap://10.0.0.1",
            &json!({ "oc": [
                { "href": "/a/light" },
                { "rt": ["core.broken"] },
                { "href": "/a/fan" }
            ] }),
        );

        assert_eq!(descriptors.recv_timeout(TIMEOUT).unwrap().path(), "/a/light");
        assert_eq!(descriptors.recv_timeout(TIMEOUT).unwrap().path(), "/a/fan");

        control.wait_for_polls(2);
        assert!(descriptors.is_empty());
        assert_eq!(client.outstanding_operations(), 1);
    }

    #[test]
    fn duplicate_announcements() {
        init_tracing();
        let (stack, control) = MockStack::new();
        let platform = Platform::new(stack);
        let deduplicating = Client::new(platform.shared(), test_config()).unwrap();
        let verbose = Client::new(platform.shared(), test_config().keep_duplicates()).unwrap();

        let (callback, unique) = events_channel::<ResourceDescriptor>();
        deduplicating.listen_for_resource("", "", callback).unwrap();
        let (callback, all) = events_channel::<ResourceDescriptor>();
        verbose.listen_for_resource("", "", callback).unwrap();

        let calls = control.calls();
        let document = json!({ "href": "/a/light" });
        for _ in 0..2 {
            for (token, _) in &calls {
                announce(&control, *token, "coap://10.0.0.1", &document);
            }
        }

        assert!(all.recv_timeout(TIMEOUT).is_ok());
        assert!(all.recv_timeout(TIMEOUT).is_ok());
        assert!(unique.recv_timeout(TIMEOUT).is_ok());

        control.wait_for_polls(4);
        assert!(unique.is_empty());
        assert!(all.is_empty());
    }

    #[test]
    fn invalid_filters() {
        let (_platform, control, client) = start_client();

        let error = client
            .listen_for_resource("coap://10.0.0.1 ", "", |_| {})
            .unwrap_err();
        assert_eq!(error.status(), Status::InvalidUri);

        for filter in ["core.light&if=x", "core light", "rt=core.light"] {
            let error = client.listen_for_resource("", filter, |_| {}).unwrap_err();
            assert_eq!(error.status(), Status::InvalidQuery);
        }

        assert!(control.calls().is_empty());
    }

    #[test]
    fn rejected_discovery() {
        let (_platform, control, client) = start_client();
        control.fail_next(Status::CommError);

        let error = client.listen_for_resource("", "", |_| {}).unwrap_err();

        assert_eq!(error.status(), Status::CommError);
        assert_eq!(client.outstanding_operations(), 0);
    }
}
