use http::Version;
use tracing::trace;

use crate::error::Error;
use crate::io::ClientIo;
use crate::request::Request;

const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Answer `Expect: 100-continue` once per request.
///
/// Anything other than an http/1.1 request carrying a matching `Expect`
/// value is a no-op. The interim response is so small that a partial write
/// is not retried; it is reported as failure instead.
pub(crate) fn test_expect<Io: ClientIo>(r: &mut Request<Io>) -> Result<(), Error> {
    if r.expect_tested || r.expect.is_none() || r.version < Version::HTTP_11 {
        return Ok(());
    }

    r.expect_tested = true;

    let matched = r
        .expect
        .as_ref()
        .map(|v| v.as_bytes().eq_ignore_ascii_case(b"100-continue"))
        .unwrap_or(false);

    if !matched {
        return Ok(());
    }

    trace!(target: "h1_body", "send 100 Continue");

    match r.io.send(CONTINUE) {
        Ok(n) if n == CONTINUE.len() => Ok(()),
        _ => Err(Error::Internal),
    }
}

#[cfg(test)]
mod test {
    use http::HeaderValue;

    use super::*;
    use crate::config::BodyConfig;
    use crate::io::mock::MockIo;

    fn request(expect: Option<&'static str>) -> Request<MockIo> {
        let mut r = Request::new(MockIo::new(Vec::new()), BodyConfig::new());
        r.set_expect(expect.map(HeaderValue::from_static));
        r
    }

    #[test]
    fn matching_expect_sends_continue_once() {
        let mut r = request(Some("100-continue"));

        test_expect(&mut r).unwrap();
        assert_eq!(r.io.sent, CONTINUE);

        // negotiation does not repeat
        test_expect(&mut r).unwrap();
        assert_eq!(r.io.sent, CONTINUE);
    }

    #[test]
    fn case_insensitive_match() {
        let mut r = request(Some("100-Continue"));
        test_expect(&mut r).unwrap();
        assert_eq!(r.io.sent, CONTINUE);
    }

    #[test]
    fn non_matching_value_is_a_no_op() {
        let mut r = request(Some("tomorrow"));
        test_expect(&mut r).unwrap();
        assert!(r.io.sent.is_empty());
        assert!(r.expect_tested);
    }

    #[test]
    fn http_10_is_a_no_op() {
        let mut r = request(Some("100-continue"));
        r.set_version(Version::HTTP_10);
        test_expect(&mut r).unwrap();
        assert!(r.io.sent.is_empty());
        assert!(!r.expect_tested);
    }

    #[test]
    fn short_send_is_an_internal_error() {
        let mut r = request(Some("100-continue"));
        r.io.send_limit = Some(10);
        assert_eq!(test_expect(&mut r), Err(Error::Internal));
    }
}
