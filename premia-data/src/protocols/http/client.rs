use std::time::Instant;

use tracing::debug;

use super::{
    http_parser::{HttpParser, StandardHttpParser},
    rest_request::RestRequest,
};
use crate::error::SocketError;

/*----- */
// Rest client
/*----- */
#[derive(Debug, Clone)]
pub struct RestClient<Parser = StandardHttpParser> {
    pub http_client: reqwest::Client,
    pub base_url: &'static str,
    pub parser: Parser,
}

impl RestClient<StandardHttpParser> {
    pub fn new(base_url: &'static str) -> Self {
        Self::with_parser(base_url, StandardHttpParser)
    }
}

impl<Parser> RestClient<Parser> {
    pub fn with_parser(base_url: &'static str, parser: Parser) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url,
            parser,
        }
    }

    pub async fn execute<Request>(
        &self,
        request: Request,
    ) -> Result<Request::Response, Parser::OutputError>
    where
        Request: RestRequest,
        Parser: HttpParser,
    {
        let request = self.build(&request)?;
        let (status, payload) = self.timed_execution::<Request>(request).await?;
        self.parser.parse::<Request::Response>(status, &payload)
    }

    pub fn url<Request>(&self, request: &Request) -> Result<String, SocketError>
    where
        Request: RestRequest,
    {
        let mut url = format!("{}{}", self.base_url, request.path());
        if let Some(params) = request.query_params() {
            let query = serde_urlencoded::to_string(params)
                .map_err(|error| SocketError::Serialise(error.to_string()))?;
            if !query.is_empty() {
                url.push('?');
                url.push_str(&query);
            }
        }
        Ok(url)
    }

    pub fn build<Request>(&self, request: &Request) -> Result<reqwest::Request, SocketError>
    where
        Request: RestRequest,
    {
        let mut builder = self
            .http_client
            .request(Request::method(), self.url(request)?)
            .timeout(Request::timeout());

        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        builder.build().map_err(SocketError::from)
    }

    async fn timed_execution<Request>(
        &self,
        request: reqwest::Request,
    ) -> Result<(reqwest::StatusCode, Vec<u8>), SocketError>
    where
        Request: RestRequest,
    {
        let path = request.url().path().to_string();
        let start = Instant::now();
        let response = self.http_client.execute(request).await?;
        let status = response.status();
        let payload = response.bytes().await?;

        debug!(
            base_url = self.base_url,
            path = %path,
            method = %Request::method(),
            status_code = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "http request complete"
        );

        Ok((status, payload.to_vec()))
    }
}

/// One-off GET for endpoints outside a venue's `RestClient` (rates, transfer status).
pub async fn get_json<Response>(url: &str) -> Result<Response, SocketError>
where
    Response: serde::de::DeserializeOwned,
{
    let response = reqwest::Client::new()
        .get(url)
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await?;
    let status = response.status();
    let payload = response.bytes().await?;
    StandardHttpParser.parse::<Response>(status, &payload)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Serialize;
    use std::borrow::Cow;

    #[derive(Serialize)]
    struct BookParams {
        currency_pair: String,
        limit: usize,
    }

    struct BookRequest(BookParams);

    impl RestRequest for BookRequest {
        type Response = serde_json::Value;
        type QueryParams = BookParams;
        type Body = ();

        fn path(&self) -> Cow<'static, str> {
            Cow::Borrowed("/api/v4/spot/order_book")
        }

        fn query_params(&self) -> Option<&BookParams> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_url_with_query() {
        let client = RestClient::new("https://api.gateio.ws");
        let request = BookRequest(BookParams {
            currency_pair: "BTC_USDT".to_string(),
            limit: 20,
        });

        assert_eq!(
            client.url(&request).unwrap(),
            "https://api.gateio.ws/api/v4/spot/order_book?currency_pair=BTC_USDT&limit=20"
        );
        assert_eq!(client.build(&request).unwrap().method(), reqwest::Method::GET);
    }
}
