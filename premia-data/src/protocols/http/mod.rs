pub mod client;
pub mod http_parser;
pub mod rest_request;
