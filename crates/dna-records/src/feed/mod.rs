//! Feed subsystem (C9): topics, day-bucketed indexes, multi-owner
//! comments, wall posts with threading, votes, and channels.

pub mod channel;
pub mod comment;
pub mod index;
pub mod topic;
pub mod vote;
pub mod wall;

pub use channel::{channel_id_of, fetch_live_channels, publish_channel, Channel};
pub use comment::{add_comment, comments_key, get_all_comments, verify_comment, Comment};
pub use index::{
    category_index_key, day_bucket, fetch_category_index, fetch_global_index, global_index_key,
    publish_index_entries, IndexEntry,
};
pub use topic::{category_id_of, create_topic, delete_topic, get_topic, topic_key, Topic};
pub use vote::{cast_vote, load_aggregate, load_and_verify_aggregate, votes_key, Vote, VoteAggregate};
pub use wall::{get_messages, post_message, verify_message, wall_key, WallMessage, WallMessageView};
