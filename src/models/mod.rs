pub mod users;
pub mod catalog;
pub mod subscriptions;
pub mod payments;
pub mod interactions;
pub mod pagination;
