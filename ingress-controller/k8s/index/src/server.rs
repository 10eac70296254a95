use crate::{
    proto::{ProtocolOptions, DEFAULT_SECURE_PORT},
    route::{self, Route},
    secrets::TlsPaths,
};
use std::fmt::Write;

/// Collects the renderable routes of one host and renders its `server`
/// blocks.
#[derive(Debug)]
pub(crate) struct Server<'h> {
    name: &'h str,
    proto: &'h ProtocolOptions,
    tls: Option<TlsPaths>,
    routes: Vec<&'h Route>,
    reject_root: bool,
}

impl<'h> Server<'h> {
    pub(crate) fn new(name: &'h str, proto: &'h ProtocolOptions) -> Self {
        Self {
            name,
            proto,
            tls: None,
            routes: Vec::new(),
            reject_root: false,
        }
    }

    pub(crate) fn set_tls(&mut self, tls: TlsPaths) {
        self.tls = Some(tls);
    }

    pub(crate) fn add_route(&mut self, route: &'h Route) {
        self.routes.push(route);
    }

    pub(crate) fn reject_root(&mut self) {
        self.reject_root = true;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// With TLS material, renders a redirecting plaintext listener followed by
    /// the secure listener; otherwise a single plaintext listener carries all
    /// routes.
    pub(crate) fn render(&self) -> String {
        let mut out = String::new();
        if self.is_empty() {
            return out;
        }

        let alt_svc = match &self.tls {
            None => {
                out.push_str("server {\n");
                let _ = writeln!(out, "    listen {};", self.proto.unsecure_port);
                let _ = writeln!(out, "    server_name {};", self.name);
                None
            }
            Some(TlsPaths { cert, key }) => {
                self.render_redirect(&mut out);

                out.push_str("server {\n");
                let _ = writeln!(out, "    listen {} ssl;", self.proto.secure_port);
                let _ = writeln!(out, "    server_name {};", self.name);
                if self.proto.http2 {
                    out.push_str("    http2 on;\n");
                }
                if self.proto.http3 {
                    out.push_str("    http3 on;\n");
                    let _ = writeln!(out, "    listen {} quic reuseport;", self.proto.secure_port);
                    out.push_str("    ssl_early_data on;\n");
                }
                out.push_str("    ssl_protocols TLSv1.2 TLSv1.3;\n");
                out.push_str("    ssl_session_timeout 10m;\n");
                out.push_str("    ssl_session_cache shared:SSL:10m;\n");
                let _ = writeln!(out, "    ssl_certificate {};", cert.display());
                let _ = writeln!(out, "    ssl_certificate_key {};", key.display());
                self.proto.alt_svc()
            }
        };

        if self.reject_root {
            out.push_str(route::reject_root());
        }
        for route in &self.routes {
            out.push_str(&route.render(self.proto, alt_svc.as_deref()));
        }
        out.push_str("}\n\n");
        out
    }

    fn render_redirect(&self, out: &mut String) {
        let port = match self.proto.secure_port {
            DEFAULT_SECURE_PORT => String::new(),
            port => format!(":{port}"),
        };
        out.push_str("server {\n");
        let _ = writeln!(out, "    listen {};", self.proto.unsecure_port);
        let _ = writeln!(out, "    server_name {};", self.name);
        let _ = writeln!(out, "    return 301 https://$host{port}$request_uri;");
        out.push_str("}\n\n");
    }
}
