mod channels;
mod details;
mod schema;
mod types;

pub use details::{CachedDetails, DEFAULT_DETAILS_TTL_HOURS};
pub use schema::Store;
pub use types::{placeholder_name, placeholder_thumbnail, ChannelRecord, StoreError, StoreEvent};
