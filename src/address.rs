//! Address-URL parsing.
//!
//! Accepts three forms:
//!
//! - `//host[:port]/path`  — explicit authority
//! - `host:port/path`      — host + port, no leading `//`
//! - `path`                — bare path; host/port default
//!
//! The path is everything after the first `/` following the authority; for
//! the bare-path form the whole input is the path.

use crate::config::{DEFAULT_HOST, DEFAULT_PORT};
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Address {
    pub fn domain(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn parse(url: &str) -> Result<Address, Error> {
    if let Some(rest) = url.strip_prefix("//") {
        let (authority, path) = split_first_slash(rest);

        if authority.is_empty() {
            return Err(Error::InvalidAddress(url.to_string()));
        }

        let (host, port) = parse_authority(authority, url)?;

        return Ok(Address {
            host,
            port,
            path: path.to_string(),
        });
    }

    // `host:port/path`: only treat the prefix as an authority if it contains
    // both a colon and a slash, with the colon preceding the slash.
    if let Some(colon) = url.find(':') {
        if let Some(slash) = url.find('/') {
            if colon < slash {
                let authority = &url[..slash];
                let path = &url[slash + 1..];
                let (host, port) = parse_authority(authority, url)?;

                return Ok(Address {
                    host,
                    port,
                    path: path.to_string(),
                });
            }
        }
    }

    Ok(Address {
        host: DEFAULT_HOST.to_string(),
        port: DEFAULT_PORT,
        path: url.to_string(),
    })
}

fn split_first_slash(s: &str) -> (&str, &str) {
    match s.find('/') {
        Some(idx) => (&s[..idx], &s[idx + 1..]),
        None => (s, ""),
    }
}

fn parse_authority(authority: &str, whole: &str) -> Result<(String, u16), Error> {
    if authority.is_empty() {
        return Err(Error::InvalidAddress(whole.to_string()));
    }

    match authority.split_once(':') {
        Some((host, port_str)) => {
            if host.is_empty() {
                return Err(Error::InvalidAddress(whole.to_string()));
            }

            let port: u16 = port_str
                .parse()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| Error::InvalidAddress(whole.to_string()))?;

            Ok((host.to_string(), port))
        }
        None => Ok((authority.to_string(), DEFAULT_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_path_defaults_host_and_port() {
        let a = parse("queue0").unwrap();
        assert_eq!(a.host, "localhost");
        assert_eq!(a.port, 5672);
        assert_eq!(a.path, "queue0");
    }

    #[test]
    fn explicit_authority() {
        let a = parse("//h:1234/q").unwrap();
        assert_eq!(a.host, "h");
        assert_eq!(a.port, 1234);
        assert_eq!(a.path, "q");
    }

    #[test]
    fn host_port_without_slashes() {
        let a = parse("h:9/q").unwrap();
        assert_eq!(a.host, "h");
        assert_eq!(a.port, 9);
        assert_eq!(a.path, "q");
    }

    #[test]
    fn empty_authority_is_invalid() {
        assert!(matches!(parse("//:5672/q"), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn non_numeric_port_is_invalid() {
        assert!(matches!(parse("h:xx/q"), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn port_out_of_range_is_invalid() {
        assert!(matches!(parse("//h:70000/q"), Err(Error::InvalidAddress(_))));
        assert!(matches!(parse("//h:0/q"), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn domain_formats_host_and_port() {
        let a = parse("//h:1234/q").unwrap();
        assert_eq!(a.domain(), "h:1234");
    }
}
