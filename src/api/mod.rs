pub mod chat_api;
pub mod rest;

pub use chat_api::{ChatApi, SendMessageRequest};
pub use rest::RestChatApi;
