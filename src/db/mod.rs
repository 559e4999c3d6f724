pub mod catalog;
pub mod interactions;
pub mod payments;
pub mod subscriptions;
pub mod users;
