mod attribute;
mod key;
mod types;
mod value;

pub use attribute::{
    Attribute, RawAttribute, RawAttributes, VENDOR_SPECIFIC, decode_attribute_stream,
    encode_attribute,
};
pub use key::AttributeKey;
pub use types::AttributeType;
pub use value::{AttributeValue, DataType};
