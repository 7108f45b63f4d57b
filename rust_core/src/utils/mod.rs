pub mod money;

pub use money::{parse_price, to_storage_scale, to_wire_f64, PriceParseError, STORAGE_SCALE};
