//! Record codecs and the two record families built on top of the chunked
//! substrate: collection lists (C8) and the feed subsystem (C9).

pub mod codec;
pub mod collections;
pub mod error;
pub mod feed;

pub use codec::{canonical_bytes, dht_key, sign_canonical, verify_canonical};
pub use collections::{
    collection_key, fetch_collection, parse_collection_frame, publish_collection,
    store_collection, Collection, CollectionKind, COLLECTION_TTL_SECS,
};
pub use error::{DnaError, Result};
pub use feed::{Channel, Comment, IndexEntry, Topic, Vote, VoteAggregate, WallMessage, WallMessageView};
