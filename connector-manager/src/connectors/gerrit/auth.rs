//! HTTP digest authentication (RFC 2617, MD5 / MD5-sess, `qop=auth`).
//!
//! Gerrit installations accept either digest or basic auth on `/a/`
//! endpoints; the scheme is picked once by probing the server.

use md5::{Digest, Md5};

/// Authentication scheme selected from the probe's `WWW-Authenticate` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    /// The challenge is `None` when the probe advertised digest without a usable nonce;
    /// the first 401 then supplies it.
    Digest(Option<DigestChallenge>),
}

impl AuthScheme {
    /// Digest if the header mentions "digest" (any case), otherwise basic.
    pub fn from_header(www_authenticate: Option<&str>) -> Self {
        match www_authenticate {
            Some(header) if header.to_ascii_lowercase().contains("digest") => {
                AuthScheme::Digest(DigestChallenge::parse(header))
            }
            _ => AuthScheme::Basic,
        }
    }
}

/// Parameters of a `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub qop: Option<String>,
    pub opaque: Option<String>,
    pub algorithm: Option<String>,
}

impl DigestChallenge {
    /// Parses the digest challenge out of a header value; `None` if it has no nonce.
    pub fn parse(header: &str) -> Option<Self> {
        let lower = header.to_ascii_lowercase();
        let start = lower.find("digest")? + "digest".len();
        let params = parse_params(&header[start..]);
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.clone())
        };
        Some(Self {
            realm: get("realm").unwrap_or_default(),
            nonce: get("nonce")?,
            qop: get("qop"),
            opaque: get("opaque"),
            algorithm: get("algorithm"),
        })
    }

    fn supports_auth_qop(&self) -> bool {
        self.qop
            .as_deref()
            .map(|qop| qop.split(',').any(|q| q.trim().eq_ignore_ascii_case("auth")))
            .unwrap_or(false)
    }

    fn is_session_algorithm(&self) -> bool {
        self.algorithm
            .as_deref()
            .map(|a| a.eq_ignore_ascii_case("MD5-sess"))
            .unwrap_or(false)
    }
}

/// A challenge plus the nonce count used against it.
#[derive(Debug, Clone)]
pub struct DigestState {
    pub challenge: DigestChallenge,
    nonce_count: u32,
}

impl DigestState {
    pub fn new(challenge: DigestChallenge) -> Self {
        Self {
            challenge,
            nonce_count: 0,
        }
    }

    /// Builds the `Authorization` header for one request and bumps the nonce count.
    pub fn authorize(
        &mut self,
        method: &str,
        uri: &str,
        username: &str,
        password: &str,
        cnonce: &str,
    ) -> String {
        self.nonce_count += 1;
        digest_authorization(
            &self.challenge,
            method,
            uri,
            username,
            password,
            self.nonce_count,
            cnonce,
        )
    }
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// Computes the `Authorization: Digest ...` value for one request.
pub fn digest_authorization(
    challenge: &DigestChallenge,
    method: &str,
    uri: &str,
    username: &str,
    password: &str,
    nonce_count: u32,
    cnonce: &str,
) -> String {
    let mut ha1 = md5_hex(&format!("{}:{}:{}", username, challenge.realm, password));
    if challenge.is_session_algorithm() {
        ha1 = md5_hex(&format!("{}:{}:{}", ha1, challenge.nonce, cnonce));
    }
    let ha2 = md5_hex(&format!("{}:{}", method, uri));
    let nc = format!("{:08x}", nonce_count);

    let response = if challenge.supports_auth_qop() {
        md5_hex(&format!(
            "{}:{}:{}:{}:auth:{}",
            ha1, challenge.nonce, nc, cnonce, ha2
        ))
    } else {
        md5_hex(&format!("{}:{}:{}", ha1, challenge.nonce, ha2))
    };

    let mut header = format!(
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\"",
        username, challenge.realm, challenge.nonce, uri, response
    );
    if let Some(opaque) = &challenge.opaque {
        header.push_str(&format!(", opaque=\"{}\"", opaque));
    }
    if let Some(algorithm) = &challenge.algorithm {
        header.push_str(&format!(", algorithm={}", algorithm));
    }
    if challenge.supports_auth_qop() {
        header.push_str(&format!(", qop=auth, nc={}, cnonce=\"{}\"", nc, cnonce));
    }
    header
}

/// Splits `k1="v, 1", k2=v2` into pairs, honouring quoted commas.
fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();
    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ',' {
                break;
            }
            key.push(c);
            chars.next();
        }
        if key.trim().is_empty() {
            break;
        }
        let mut value = String::new();
        if chars.peek() == Some(&'=') {
            chars.next();
            if chars.peek() == Some(&'"') {
                chars.next();
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => value.push(c),
                    }
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c == ',' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
            }
        }
        params.push((key.trim().to_string(), value.trim().to_string()));
    }
    params
}
