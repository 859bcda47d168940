//! Request middleware

pub mod auth;

pub use auth::{
    auth_middleware, check_permission, AuthUser, Claims, CurrentUser, STOCK_CONFIRM, STOCK_READ,
    STOCK_WRITE,
};
