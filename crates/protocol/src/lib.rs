mod events;
mod http;

pub use events::*;
pub use http::*;
