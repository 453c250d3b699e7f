use serde::{Deserialize, Serialize};

/// The transport family used to reach a resource.
///
/// It is an opaque discriminator for the engine: the protocol stack decides
/// how each family is actually reached.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectivityType {
    /// Any available transport.
    #[default]
    All,
    /// `IPv4` network.
    Ipv4,
    /// `IPv6` network.
    Ipv6,
    /// Bluetooth basic rate / enhanced data rate.
    Edr,
    /// Bluetooth low energy.
    Le,
}

impl ConnectivityType {
    /// Returns the [`ConnectivityType`] name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
            Self::Edr => "edr",
            Self::Le => "le",
        }
    }
}

impl core::fmt::Display for ConnectivityType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.name().fmt(f)
    }
}
