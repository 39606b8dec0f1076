//! Stateless parsers for the individual lines of a listing card.
//!
//! Every parser is total: text that does not have the expected shape yields
//! `None` (or "now" for timestamps), never an error.

pub mod location;
pub mod price;
pub mod stats;
pub mod surface;
pub mod time;

pub use location::{CategoryLabel, LocationParser};
pub use price::{is_price_line, parse_price};
pub use stats::{StatsGrammar, StatsShape};
pub use surface::parse_surface_in_title;
pub use time::{is_relative_time, parse_relative_time};
