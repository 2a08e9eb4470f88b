//! SDP cleanup before an offer is forwarded to the gateway.

/// Normalize line endings to CRLF and make sure the body ends with one.
///
/// Browsers and viewer libraries disagree on line endings; Janus parses
/// with a strict CRLF tokenizer.
pub fn normalize_offer(sdp: &str) -> String {
    let mut out = String::with_capacity(sdp.len() + 16);
    for line in sdp.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lf_becomes_crlf() {
        assert_eq!(normalize_offer("v=0\no=- 1 1 IN IP4 0.0.0.0\n"), "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\n");
    }

    #[test]
    fn crlf_is_untouched() {
        let sdp = "v=0\r\ns=-\r\n";
        assert_eq!(normalize_offer(sdp), sdp);
    }

    #[test]
    fn missing_trailing_newline_is_added() {
        assert_eq!(normalize_offer("v=0\r\ns=-"), "v=0\r\ns=-\r\n");
    }

    #[test]
    fn blank_lines_are_dropped() {
        assert_eq!(normalize_offer("v=0\n\n\r\ns=-\n"), "v=0\r\ns=-\r\n");
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(normalize_offer(""), "");
    }
}
