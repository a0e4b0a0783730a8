use crate::error::SocketError;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

pub trait HttpParser {
    type ApiError: DeserializeOwned;
    type OutputError: From<SocketError>;

    fn parse<Response>(
        &self,
        status: StatusCode,
        payload: &[u8],
    ) -> Result<Response, Self::OutputError>
    where
        Response: DeserializeOwned,
    {
        // Non 2xx is an API error whatever the body looks like
        if !status.is_success() {
            return match serde_json::from_slice::<Self::ApiError>(payload) {
                Ok(api_error) => Err(self.parse_api_error(status, api_error)),
                Err(_) => Err(Self::OutputError::from(SocketError::HttpResponse(
                    status,
                    String::from_utf8_lossy(payload).into_owned(),
                ))),
            };
        }

        let parse_ok_error = match serde_json::from_slice::<Response>(payload) {
            Ok(response) => return Ok(response),
            Err(serde_error) => serde_error,
        };

        debug!(
            status_code = ?status,
            ?parse_ok_error,
            response_body = %String::from_utf8_lossy(payload),
            "error deserializing HTTP response"
        );

        Err(Self::OutputError::from(SocketError::DeserialiseBinary {
            error: parse_ok_error,
            payload: payload.to_vec(),
        }))
    }

    fn parse_api_error(&self, status: StatusCode, error: Self::ApiError) -> Self::OutputError;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StandardHttpParser;

impl HttpParser for StandardHttpParser {
    type ApiError = serde_json::Value;
    type OutputError = SocketError;

    fn parse_api_error(&self, status: StatusCode, api_error: Self::ApiError) -> Self::OutputError {
        SocketError::HttpResponse(status, api_error.to_string())
    }
}
