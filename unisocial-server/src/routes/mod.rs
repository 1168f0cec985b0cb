pub mod admin;
pub mod auth;
pub mod blocks;
pub mod follows;
pub mod health;
pub mod messages;
pub mod notifications;
pub mod posts;
pub mod profile;
pub mod reports;
pub mod users;
