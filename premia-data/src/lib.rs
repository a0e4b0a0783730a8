pub mod assets;
pub mod error;
pub mod exchange;
pub mod feed;
pub mod orderbook;
pub mod protocols;
pub mod rates;
pub mod shared;
pub mod transfer;
