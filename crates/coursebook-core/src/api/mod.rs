//! REST API gateway for the learning-management backend.
//!
//! This module provides the `ApiClient`, which wraps every outbound call
//! with transparent session recovery: an expired access credential triggers
//! one shared refresh and a single replay of the failed call.
//!
//! The backend authenticates with httpOnly cookies by default; a bearer
//! token pair is supported as an alternate credential mode.

pub mod auth;
pub mod client;
pub mod error;
pub mod resources;
pub mod transport;

pub use client::{ApiClient, ClientSettings, RequestOptions};
pub use error::{ApiError, TransportError};
pub use resources::FileUpload;
pub use transport::{HttpRequest, HttpResponse, MultipartPayload, RequestBody, ReqwestTransport, Transport};
