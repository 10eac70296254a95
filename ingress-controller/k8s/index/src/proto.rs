use std::fmt;

pub const DEFAULT_SECURE_PORT: u16 = 443;
pub const DEFAULT_UNSECURE_PORT: u16 = 80;

/// Per-host listener options.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProtocolOptions {
    pub http2: bool,
    pub http3: bool,
    pub websocket: bool,
    pub secure_port: u16,
    pub unsecure_port: u16,
}

// === impl ProtocolOptions ===

impl Default for ProtocolOptions {
    fn default() -> Self {
        Self {
            http2: false,
            http3: false,
            websocket: false,
            secure_port: DEFAULT_SECURE_PORT,
            unsecure_port: DEFAULT_UNSECURE_PORT,
        }
    }
}

impl ProtocolOptions {
    /// Combines options declared by another ingress for the same host.
    ///
    /// Enabled flags and non-default ports win; a flag is never turned back
    /// off by a merge.
    pub fn merge(&mut self, other: &Self) {
        if other.secure_port != DEFAULT_SECURE_PORT {
            self.secure_port = other.secure_port;
        }
        if other.unsecure_port != DEFAULT_UNSECURE_PORT {
            self.unsecure_port = other.unsecure_port;
        }
        self.http2 |= other.http2;
        self.http3 |= other.http3;
        self.websocket |= other.websocket;
    }

    /// Returns the `Alt-Svc` header value advertising the enabled protocols
    /// on the secure port, if any are enabled.
    pub fn alt_svc(&self) -> Option<String> {
        let mut protos = Vec::with_capacity(2);
        if self.http2 {
            protos.push(format!("h2=\":{}\"", self.secure_port));
        }
        if self.http3 {
            protos.push(format!("h3=\":{}\"", self.secure_port));
        }
        if protos.is_empty() {
            return None;
        }
        Some(protos.join(","))
    }
}

impl fmt::Display for ProtocolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        if self.http2 {
            write!(f, " HTTP2")?;
        }
        if self.http3 {
            write!(f, " HTTP3")?;
        }
        if self.websocket {
            write!(f, " WebSocket")?;
        }
        if self.secure_port != DEFAULT_SECURE_PORT {
            write!(f, " securePort: {}", self.secure_port)?;
        }
        if self.unsecure_port != DEFAULT_UNSECURE_PORT {
            write!(f, " unsecurePort: {}", self.unsecure_port)?;
        }
        write!(f, " ]")
    }
}
