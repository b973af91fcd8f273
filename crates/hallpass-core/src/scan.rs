//! Resolving a scanned hall-ticket QR code.
//!
//! Decoding the image is someone else's job. What arrives here is the
//! decoded text, which must be a URL carrying the student id in its
//! `RegisterNo` query parameter.

use sqlx::PgPool;

use crate::error::AllocationError;
use crate::ticket::{self, HallTicket};

/// Query parameter that carries the student id.
pub const REGISTER_NO_PARAM: &str = "RegisterNo";

/// Pull the student id out of decoded QR text.
pub fn register_no_from_payload(decoded: &str) -> Result<String, AllocationError> {
    let url = decoded.trim();
    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(AllocationError::InvalidScanPayload(
            "QR code does not contain a URL".to_owned(),
        ));
    };
    let scheme_ok = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !scheme_ok || rest.is_empty() {
        return Err(AllocationError::InvalidScanPayload(
            "QR code does not contain a URL".to_owned(),
        ));
    }

    let query = rest
        .split_once('?')
        .map(|(_, q)| q.split_once('#').map_or(q, |(q, _)| q))
        .unwrap_or("");

    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if decode_component(key)? != REGISTER_NO_PARAM {
            continue;
        }
        let value = decode_component(value)?;
        let value = value.trim();
        if !value.is_empty() {
            return Ok(value.to_owned());
        }
    }

    Err(AllocationError::InvalidScanPayload(format!(
        "URL has no {REGISTER_NO_PARAM} parameter"
    )))
}

fn decode_component(raw: &str) -> Result<String, AllocationError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|_| AllocationError::InvalidScanPayload("URL is not valid UTF-8".to_owned()))
}

/// Resolve decoded QR text to the hall ticket it points at.
pub async fn scan_hall_ticket(pool: &PgPool, decoded: &str) -> Result<HallTicket, AllocationError> {
    let student_id = register_no_from_payload(decoded)?;
    ticket::hall_ticket(pool, &student_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_register_no() {
        let id = register_no_from_payload("https://exams.example.edu/ticket?RegisterNo=21CS042").unwrap();
        assert_eq!(id, "21CS042");
    }

    #[test]
    fn finds_parameter_among_others() {
        let id = register_no_from_payload(
            "  http://localhost:5173/hallticket?lang=en&RegisterNo=S%2F77&x=1#top \n",
        )
        .unwrap();
        assert_eq!(id, "S/77");
    }

    #[test]
    fn decodes_plus_as_space() {
        let id = register_no_from_payload("https://x.test/?RegisterNo=Lab+A+12").unwrap();
        assert_eq!(id, "Lab A 12");
    }

    #[test]
    fn plain_text_is_not_a_url() {
        let err = register_no_from_payload("21CS042").unwrap_err();
        assert_eq!(err.kind(), "invalid_scan_payload");
        assert!(err.to_string().contains("does not contain a URL"));
    }

    #[test]
    fn bad_scheme_is_not_a_url() {
        assert!(register_no_from_payload("1http://x.test/?RegisterNo=1").is_err());
        assert!(register_no_from_payload("https://").is_err());
    }

    #[test]
    fn missing_or_empty_parameter() {
        for payload in [
            "https://x.test/ticket",
            "https://x.test/ticket?registerno=S1",
            "https://x.test/ticket?RegisterNo=",
            "https://x.test/ticket#RegisterNo=S1",
        ] {
            let err = register_no_from_payload(payload).unwrap_err();
            assert!(
                err.to_string().contains("no RegisterNo parameter"),
                "{payload}: {err}"
            );
        }
    }
}
