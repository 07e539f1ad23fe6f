pub mod token;
pub use token::TokenStore;

pub mod image;
pub use image::{ImageError, ImageStore, MAX_IMAGE_BYTES};

pub mod validation;
pub use validation::Violation;

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, Credentials, LoginResult};
pub use auth_service_impl::SeaOrmAuthService;

pub mod user_service;
pub mod user_service_impl;
pub use user_service::{ProfileUpdate, Registration, UserError, UserService, UserView};
pub use user_service_impl::SeaOrmUserService;
