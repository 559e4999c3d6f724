pub mod payment_gateway;
pub mod subscription_lifecycle;
pub mod subscription_rules;

pub use payment_gateway::{build_gateway, PaymentGateway};
pub use subscription_lifecycle::SubscriptionService;
