pub mod calculations;
pub mod fees;
pub mod resources;
pub mod server;
pub mod settings;
pub mod universe;
pub mod watch;

#[cfg(test)]
mod mock_data;
