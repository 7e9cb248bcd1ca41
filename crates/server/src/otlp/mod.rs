//! OTLP/HTTP wire handling: body decoding (JSON, protobuf, gzip),
//! key normalization, and transformation into persistence rows.

pub mod decode;
pub mod normalize;
pub mod proto;
pub mod transform;

pub use decode::{decode_logs_body, decode_traces_body, DecodeError};
