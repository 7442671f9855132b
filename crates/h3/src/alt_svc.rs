//! `Alt-Svc` advertisement of the HTTP/3 endpoint (RFC 7838).
//!
//! A response served over HTTP/1.1 or HTTP/2 can carry an `alt-svc` header
//! telling the client the same origin is reachable over HTTP/3, e.g.
//! `h3=":443"; ma=86400`. Browsers then try QUIC on later requests.
//!
//! Advertising is independent of the HTTP/3 stream lifecycle: it only looks
//! at the version the response is served with, and only touches the response
//! it is given.

use std::fmt;
use std::str::FromStr;

use http::header::ALT_SVC;
use http::{HeaderValue, Response, Version};

use crate::protocol::AltSvcError;

/// ALPN token for HTTP/3.
pub const H3_ALPN: &str = "h3";

/// One alternative service: where the HTTP/3 endpoint is and how long the
/// client may remember it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AltSvc {
    protocol_id: String,
    host: Option<String>,
    port: u16,
    max_age: Option<u32>,
}

impl AltSvc {
    pub fn new<S: Into<String>>(protocol_id: S, port: u16) -> Self {
        Self { protocol_id: protocol_id.into(), host: None, port, max_age: None }
    }

    /// HTTP/3 on `port` of the same host.
    pub fn h3(port: u16) -> Self {
        Self::new(H3_ALPN, port)
    }

    /// Points at another host instead of the origin's own.
    #[must_use]
    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets `ma`, the freshness lifetime in seconds.
    #[must_use]
    pub fn with_max_age(mut self, secs: u32) -> Self {
        self.max_age = Some(secs);
        self
    }

    pub fn protocol_id(&self) -> &str {
        &self.protocol_id
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn max_age(&self) -> Option<u32> {
        self.max_age
    }
}

impl fmt::Display for AltSvc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=\"{}:{}\"", self.protocol_id, self.host.as_deref().unwrap_or(""), self.port)?;
        if let Some(max_age) = self.max_age {
            write!(f, "; ma={max_age}")?;
        }
        Ok(())
    }
}

impl FromStr for AltSvc {
    type Err = AltSvcError;

    /// Parses the first alternative of an `alt-svc` value. Parameters other
    /// than `ma` are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let first = s.split(',').next().unwrap_or_default().trim();
        if first.eq_ignore_ascii_case("clear") {
            return Err(AltSvcError::invalid_value("clear carries no alternative"));
        }

        let mut parts = first.split(';');
        let alternative = parts.next().unwrap_or_default().trim();
        let (protocol_id, authority) =
            alternative.split_once('=').ok_or_else(|| AltSvcError::invalid_value(alternative))?;
        let protocol_id = protocol_id.trim();
        if protocol_id.is_empty() {
            return Err(AltSvcError::invalid_value("missing protocol id"));
        }

        let authority = authority
            .trim()
            .strip_prefix('"')
            .and_then(|a| a.strip_suffix('"'))
            .ok_or_else(|| AltSvcError::invalid_value(authority))?;
        let (host, port) = authority.rsplit_once(':').ok_or_else(|| AltSvcError::invalid_value(authority))?;
        let port = port.parse::<u16>().map_err(|_| AltSvcError::invalid_port(port))?;

        let mut alt_svc = AltSvc::new(protocol_id, port);
        if !host.is_empty() {
            alt_svc = alt_svc.with_host(host);
        }

        for param in parts {
            if let Some((name, value)) = param.split_once('=')
                && name.trim().eq_ignore_ascii_case("ma")
            {
                let value = value.trim().trim_matches('"');
                let max_age = value.parse::<u32>().map_err(|_| AltSvcError::invalid_value(param))?;
                alt_svc = alt_svc.with_max_age(max_age);
            }
        }
        Ok(alt_svc)
    }
}

/// Attaches a fixed `alt-svc` value to responses served below HTTP/3.
#[derive(Debug, Clone)]
pub struct AltSvcAdvertiser {
    value: HeaderValue,
}

impl AltSvcAdvertiser {
    /// Advertises a single alternative.
    pub fn new(alt_svc: &AltSvc) -> Result<Self, AltSvcError> {
        Self::from_services(std::slice::from_ref(alt_svc))
    }

    /// Advertises several alternatives, in order of preference.
    pub fn from_services(services: &[AltSvc]) -> Result<Self, AltSvcError> {
        if services.is_empty() {
            return Err(AltSvcError::invalid_value("no alternative service"));
        }
        let value = services.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        let value = HeaderValue::try_from(value).map_err(AltSvcError::invalid_value)?;
        Ok(Self { value })
    }

    /// Tells clients to forget previously advertised alternatives.
    pub fn clear() -> Self {
        Self { value: HeaderValue::from_static("clear") }
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.value
    }

    /// Sets the `alt-svc` header on `response` when it is served with a
    /// version below HTTP/3. Returns whether the header was set.
    pub fn advertise<B>(&self, negotiated: Version, response: &mut Response<B>) -> bool {
        if negotiated >= Version::HTTP_3 {
            return false;
        }
        response.headers_mut().insert(ALT_SVC, self.value.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_same_host_alternative() {
        assert_eq!(AltSvc::h3(443).with_max_age(86400).to_string(), "h3=\":443\"; ma=86400");
        assert_eq!(AltSvc::h3(8443).to_string(), "h3=\":8443\"");
    }

    #[test]
    fn formats_alternative_with_host() {
        let alt_svc = AltSvc::h3(443).with_host("quic.example.com").with_max_age(3600);
        assert_eq!(alt_svc.to_string(), "h3=\"quic.example.com:443\"; ma=3600");
    }

    #[test]
    fn parses_first_alternative() {
        let alt_svc: AltSvc = "h3=\":4433\"; ma=60; persist=1, h2=\"other:443\"".parse().unwrap();
        assert_eq!(alt_svc.protocol_id(), "h3");
        assert_eq!(alt_svc.host(), None);
        assert_eq!(alt_svc.port(), 4433);
        assert_eq!(alt_svc.max_age(), Some(60));
    }

    #[test]
    fn parses_ipv6_host() {
        let alt_svc: AltSvc = "h3=\"[::1]:443\"".parse().unwrap();
        assert_eq!(alt_svc.host(), Some("[::1]"));
        assert_eq!(alt_svc.port(), 443);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(matches!("clear".parse::<AltSvc>(), Err(AltSvcError::InvalidValue { .. })));
        assert!(matches!("h3=:443".parse::<AltSvc>(), Err(AltSvcError::InvalidValue { .. })));
        assert_eq!("h3=\":http\"".parse::<AltSvc>(), Err(AltSvcError::invalid_port("http")));
    }

    #[test]
    fn advertises_only_below_http3() {
        let advertiser = AltSvcAdvertiser::new(&AltSvc::h3(443).with_max_age(86400)).unwrap();

        let mut response = Response::new(());
        assert!(advertiser.advertise(Version::HTTP_11, &mut response));
        assert_eq!(response.headers()[ALT_SVC], "h3=\":443\"; ma=86400");

        let mut response = Response::new(());
        assert!(advertiser.advertise(Version::HTTP_2, &mut response));
        assert_eq!(response.headers().get_all(ALT_SVC).iter().count(), 1);

        let mut response = Response::new(());
        assert!(!advertiser.advertise(Version::HTTP_3, &mut response));
        assert!(response.headers().get(ALT_SVC).is_none());
    }

    #[test]
    fn advertises_several_alternatives_in_order() {
        let advertiser = AltSvcAdvertiser::from_services(&[AltSvc::h3(443), AltSvc::new("h3-29", 443)]).unwrap();
        assert_eq!(advertiser.header_value(), "h3=\":443\", h3-29=\":443\"");
        assert_eq!(AltSvcAdvertiser::clear().header_value(), "clear");
    }
}
