use std::borrow::Cow;
use std::time::Duration;

use oic::connectivity::ConnectivityType;

use crate::stack::QualityOfService;

// Well-known path answering discovery requests.
const DISCOVERY_URI: &str = "/oc/core";

// Well-known path of the presence feed.
const PRESENCE_URI: &str = "/oc/presence";

// Name given to the listener thread.
const THREAD_NAME: &str = "oic-listener";

/// Client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub(crate) poll_interval: Duration,
    pub(crate) discovery_uri: Cow<'static, str>,
    pub(crate) presence_uri: Cow<'static, str>,
    pub(crate) quality_of_service: QualityOfService,
    pub(crate) connectivity: ConnectivityType,
    pub(crate) deduplicate_discovery: bool,
    pub(crate) thread_name: Cow<'static, str>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// Creates a [`ClientConfig`] with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(10), // Default interval of 10ms.
            discovery_uri: Cow::Borrowed(DISCOVERY_URI),
            presence_uri: Cow::Borrowed(PRESENCE_URI),
            quality_of_service: QualityOfService::Low,
            connectivity: ConnectivityType::All,
            deduplicate_discovery: true,
            thread_name: Cow::Borrowed(THREAD_NAME),
        }
    }

    /// Sets the interval between two polls of the protocol stack.
    #[must_use]
    pub const fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the path used for discovery requests.
    #[must_use]
    #[inline]
    pub fn discovery_uri(mut self, discovery_uri: impl Into<Cow<'static, str>>) -> Self {
        self.discovery_uri = discovery_uri.into();
        self
    }

    /// Sets the path of the presence feed.
    #[must_use]
    #[inline]
    pub fn presence_uri(mut self, presence_uri: impl Into<Cow<'static, str>>) -> Self {
        self.presence_uri = presence_uri.into();
        self
    }

    /// Sets the [`QualityOfService`] of outgoing messages.
    #[must_use]
    pub const fn quality_of_service(mut self, quality_of_service: QualityOfService) -> Self {
        self.quality_of_service = quality_of_service;
        self
    }

    /// Sets the [`ConnectivityType`] used for discovery.
    #[must_use]
    pub const fn connectivity(mut self, connectivity: ConnectivityType) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Reports every discovery announcement, even when a resource has
    /// already been reported.
    ///
    /// Otherwise each listen remembers every distinct resource it has
    /// reported, for as long as the client lives, so the memory it uses grows
    /// with the number of resources found on the network.
    #[must_use]
    pub const fn keep_duplicates(mut self) -> Self {
        self.deduplicate_discovery = false;
        self
    }

    /// Sets the name of the listener thread.
    #[must_use]
    #[inline]
    pub fn thread_name(mut self, thread_name: impl Into<Cow<'static, str>>) -> Self {
        self.thread_name = thread_name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use oic::connectivity::ConnectivityType;

    use crate::stack::QualityOfService;

    use super::ClientConfig;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();

        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.discovery_uri, "/oc/core");
        assert_eq!(config.presence_uri, "/oc/presence");
        assert_eq!(config.quality_of_service, QualityOfService::Low);
        assert_eq!(config.connectivity, ConnectivityType::All);
        assert!(config.deduplicate_discovery);
        assert_eq!(config.thread_name, "oic-listener");
    }

    #[test]
    fn custom_config() {
        let config = ClientConfig::new()
            .poll_interval(Duration::from_millis(1))
            .discovery_uri("/oic/res")
            .quality_of_service(QualityOfService::High)
            .connectivity(ConnectivityType::Ipv6)
            .keep_duplicates()
            .thread_name("listener");

        assert_eq!(config.poll_interval, Duration::from_millis(1));
        assert_eq!(config.discovery_uri, "/oic/res");
        assert_eq!(config.quality_of_service, QualityOfService::High);
        assert_eq!(config.connectivity, ConnectivityType::Ipv6);
        assert!(!config.deduplicate_discovery);
        assert_eq!(config.thread_name, "listener");
    }
}
