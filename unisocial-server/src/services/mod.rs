pub mod auth_service;
pub mod block_service;
pub mod conversation;
pub mod maintenance;
pub mod notification_service;
pub mod token_service;
