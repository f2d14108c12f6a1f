use reqwest::StatusCode;

/// Classification of a single booking attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// HTTP 200, booking accepted
    Booked,
    /// HTTP 400 or 500, an expected rejection or server error
    Rejected(StatusCode),
    /// Any other status (e.g. 409 sold out); a failed booking that also fails the check
    Unexpected(StatusCode),
    /// No HTTP response at all
    TransportFailure(String),
}

impl RequestOutcome {
    pub fn classify(status: StatusCode) -> Self {
        match status.as_u16() {
            200 => Self::Booked,
            400 | 500 => Self::Rejected(status),
            _ => Self::Unexpected(status),
        }
    }

    /// Whether the response status was one of the accepted set (200, 400, 500)
    pub fn check_passed(&self) -> bool {
        matches!(self, Self::Booked | Self::Rejected(_))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Booked => Some(StatusCode::OK),
            Self::Rejected(status) | Self::Unexpected(status) => Some(*status),
            Self::TransportFailure(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(200, RequestOutcome::Booked, true)]
    #[case(400, RequestOutcome::Rejected(StatusCode::BAD_REQUEST), true)]
    #[case(500, RequestOutcome::Rejected(StatusCode::INTERNAL_SERVER_ERROR), true)]
    #[case(409, RequestOutcome::Unexpected(StatusCode::CONFLICT), false)]
    #[case(404, RequestOutcome::Unexpected(StatusCode::NOT_FOUND), false)]
    #[case(201, RequestOutcome::Unexpected(StatusCode::CREATED), false)]
    #[case(503, RequestOutcome::Unexpected(StatusCode::SERVICE_UNAVAILABLE), false)]
    fn test_classify(#[case] code: u16, #[case] expected: RequestOutcome, #[case] passed: bool) {
        let outcome = RequestOutcome::classify(StatusCode::from_u16(code).unwrap());
        assert_eq!(outcome, expected);
        assert_eq!(outcome.check_passed(), passed);
        assert_eq!(outcome.status().map(|s| s.as_u16()), Some(code));
    }

    #[test]
    fn test_transport_failure_fails_check() {
        let outcome = RequestOutcome::TransportFailure("connection refused".to_string());
        assert!(!outcome.check_passed());
        assert_eq!(outcome.status(), None);
    }
}
