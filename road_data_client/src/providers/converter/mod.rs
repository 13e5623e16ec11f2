//! Client for the road-address / coordinate / link-range converter.

mod client;
mod request;
mod response;

pub use client::{ConverterClient, ConverterSettings};
pub use request::{ConversionRequest, RETURN_LINK_LOCATION, STATE_ADMIN_CLASS};
pub use response::{ConversionFeature, ConvertedLocation};
