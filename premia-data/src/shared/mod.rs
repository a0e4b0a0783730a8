pub mod de;
pub mod subscription_models;
pub mod utils;
