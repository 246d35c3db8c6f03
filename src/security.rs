use subtle::ConstantTimeEq;

/// Constant-time string comparison to prevent timing attacks
/// Use this for comparing auth tokens and other sensitive values
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Decide whether a request may proceed.
///
/// With no configured token (or an empty one) the deployment is open and
/// every request is allowed. Otherwise the supplied token must match exactly;
/// a missing token never matches.
pub fn authenticate(supplied: Option<&str>, configured: Option<&str>) -> bool {
    match configured {
        None | Some("") => true,
        Some(expected) => supplied.is_some_and(|token| constant_time_compare(token, expected)),
    }
}
