use crate::config::ApiConfig;

use super::decode::{decode_thots, decode_trades};
use super::{
    FetchOutcome, FetchResult, HttpClient, RateLimit, RawResponse, ThotFilter, ThotPayload,
    ThotSource,
};

/// Live [`ThotSource`] backed by the remote HTTP API.
#[derive(Debug, Clone)]
pub struct ThotFetcher {
    http: HttpClient,
}

impl ThotFetcher {
    pub fn new(api: &ApiConfig) -> FetchResult<Self> {
        Ok(Self::from_client(HttpClient::new(api)?))
    }

    pub(crate) fn from_client(http: HttpClient) -> Self {
        Self { http }
    }
}

impl ThotSource for ThotFetcher {
    async fn fetch(&self, filter: &ThotFilter) -> FetchResult<FetchOutcome> {
        let query = filter.query();
        let response = self.http.get(filter.resource(), &query).await?;
        interpret_response(filter, &response)
    }
}

/// Read the rate-limit headers, then decode the body for the resource `filter` targets.
pub fn interpret_response(filter: &ThotFilter, response: &RawResponse) -> FetchResult<FetchOutcome> {
    let rate_limit = RateLimit::from_headers(&response.headers)?;
    log::info!("{rate_limit}");

    let payload = match filter {
        ThotFilter::Username(_) => {
            let (trades, discarded) = decode_trades(&response.body)?;
            ThotPayload::Trades { trades, discarded }
        }
        ThotFilter::All | ThotFilter::Ticker(_) => {
            let (pairs, discarded) = decode_thots(&response.body)?;
            ThotPayload::Thots { pairs, discarded }
        }
    };

    Ok(FetchOutcome {
        payload,
        rate_limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::fetch::rate_limit::{REMAINING_HEADER, RESET_HEADER};
    use reqwest::header::{HeaderMap, HeaderValue};

    fn response(remaining: &'static str, body: &str) -> RawResponse {
        let mut headers = HeaderMap::new();
        headers.insert(REMAINING_HEADER, HeaderValue::from_static(remaining));
        headers.insert(RESET_HEADER, HeaderValue::from_static("1700000000"));
        RawResponse {
            headers,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn ticker_response_yields_pairs_and_rate_limit() {
        let body = r#"{"data":{"thots":[{"User":{"guid":"u1"},"Trade":{"guid":"t1"}},null]}}"#;
        let outcome =
            interpret_response(&ThotFilter::Ticker("AAPL".into()), &response("3", body)).unwrap();

        assert_eq!(outcome.rate_limit.remaining, 3);
        assert!(outcome.rate_limit.is_exhausted(5));
        match outcome.payload {
            ThotPayload::Thots { pairs, discarded } => {
                assert_eq!(pairs.len(), 1);
                assert_eq!(discarded, 1);
            }
            other => panic!("expected thots payload, got {other:?}"),
        }
    }

    #[test]
    fn username_response_yields_trades() {
        let body = r#"{"data":{"trades":[{"guid":"t1","symbol":"SPY"},null]}}"#;
        let outcome =
            interpret_response(&ThotFilter::Username("bob".into()), &response("90", body)).unwrap();

        assert!(matches!(
            outcome.payload,
            ThotPayload::Trades { ref trades, discarded: 1 } if trades.len() == 1
        ));
    }

    #[test]
    fn username_response_rejects_thots_shape() {
        let body = r#"{"data":{"thots":[]}}"#;
        let err = interpret_response(&ThotFilter::Username("bob".into()), &response("90", body))
            .expect_err("trades key is required");
        assert!(matches!(err, AppError::Schema(_)), "unexpected error: {err}");
    }

    #[test]
    fn missing_rate_limit_headers_fail_before_decoding() {
        let raw = RawResponse {
            headers: HeaderMap::new(),
            body: br#"{"data":{"thots":[]}}"#.to_vec(),
        };
        let err = interpret_response(&ThotFilter::All, &raw).expect_err("headers are required");
        assert!(matches!(err, AppError::Protocol(_)), "unexpected error: {err}");
    }
}
