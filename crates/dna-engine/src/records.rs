//! Thin pass-through wrappers binding the record operations in
//! `dna-records` to an engine's chunked layer, so callers don't have to
//! thread `engine.chunked()` through every call site themselves.

use dna_records::{
    Channel, Collection, CollectionKind, Comment, IndexEntry, Topic, Vote, VoteAggregate,
    WallMessage, WallMessageView,
};

use crate::engine::Engine;

impl Engine {
    pub async fn create_topic(
        &self,
        author_fp: &str,
        title: &str,
        body: &str,
        category_name: &str,
        tags: Vec<String>,
        signing_secret_key: &[u8],
    ) -> dna_records::Result<Topic> {
        dna_records::feed::create_topic(
            self.chunked().as_ref(),
            author_fp,
            title,
            body,
            category_name,
            tags,
            signing_secret_key,
        )
        .await
    }

    pub async fn get_topic(&self, uuid: &str, signing_public_key: &[u8]) -> dna_records::Result<Topic> {
        dna_records::feed::get_topic(self.chunked().as_ref(), uuid, signing_public_key).await
    }

    pub async fn delete_topic(
        &self,
        uuid: &str,
        caller_fp: &str,
        signing_public_key: &[u8],
        signing_secret_key: &[u8],
    ) -> dna_records::Result<Topic> {
        dna_records::feed::delete_topic(
            self.chunked().as_ref(),
            uuid,
            caller_fp,
            signing_public_key,
            signing_secret_key,
        )
        .await
    }

    pub async fn add_comment(
        &self,
        topic_uuid: &str,
        author_fp: &str,
        body: &str,
        parent_comment_uuid: Option<&str>,
        mentions: Vec<String>,
        signing_secret_key: &[u8],
    ) -> dna_records::Result<Comment> {
        dna_records::feed::add_comment(
            self.chunked().as_ref(),
            topic_uuid,
            author_fp,
            body,
            parent_comment_uuid,
            mentions,
            signing_secret_key,
        )
        .await
    }

    pub async fn get_all_comments(&self, topic_uuid: &str) -> dna_records::Result<Vec<Comment>> {
        dna_records::feed::get_all_comments(self.chunked().as_ref(), topic_uuid).await
    }

    pub async fn fetch_category_index(&self, category_id: &str, date: &str) -> dna_records::Result<Vec<IndexEntry>> {
        dna_records::feed::fetch_category_index(self.chunked().as_ref(), category_id, date).await
    }

    pub async fn fetch_global_index(&self, date: &str) -> dna_records::Result<Vec<IndexEntry>> {
        dna_records::feed::fetch_global_index(self.chunked().as_ref(), date).await
    }

    pub async fn post_wall_message(
        &self,
        wall_owner_fp: &str,
        poster_fp: &str,
        text: &str,
        reply_to: Option<&str>,
        signing_secret_key: &[u8],
    ) -> dna_records::Result<WallMessage> {
        dna_records::feed::post_message(
            self.chunked().as_ref(),
            wall_owner_fp,
            poster_fp,
            text,
            reply_to,
            signing_secret_key,
        )
        .await
    }

    pub async fn get_wall_messages(&self, wall_owner_fp: &str, poster_fp: &str) -> dna_records::Result<Vec<WallMessageView>> {
        dna_records::feed::get_messages(self.chunked().as_ref(), wall_owner_fp, poster_fp).await
    }

    pub async fn cast_vote(
        &self,
        post_id: &str,
        voter_fp: &str,
        vote_value: i8,
        signing_secret_key: &[u8],
    ) -> dna_records::Result<VoteAggregate> {
        dna_records::feed::cast_vote(self.chunked().as_ref(), post_id, voter_fp, vote_value, signing_secret_key).await
    }

    pub async fn load_and_verify_votes(
        &self,
        post_id: &str,
        signer_lookup: &dyn Fn(&str) -> Option<Vec<u8>>,
    ) -> dna_records::Result<VoteAggregate> {
        dna_records::feed::load_and_verify_aggregate(self.chunked().as_ref(), post_id, signer_lookup).await
    }

    pub async fn publish_channel(&self, channel: Channel, publisher_fp: &str) -> dna_records::Result<()> {
        dna_records::feed::publish_channel(self.chunked().as_ref(), channel, publisher_fp).await
    }

    pub async fn fetch_live_channels(&self) -> dna_records::Result<Vec<Channel>> {
        dna_records::feed::fetch_live_channels(self.chunked().as_ref()).await
    }

    pub async fn store_collection(
        &self,
        kind: CollectionKind,
        owner_fp: &str,
        items: Vec<String>,
        version: u64,
        signing_secret_key: &[u8],
        enc_public_key: &[u8],
    ) -> dna_records::Result<()> {
        dna_records::store_collection(
            self.chunked().as_ref(),
            kind,
            owner_fp,
            items,
            version,
            signing_secret_key,
            enc_public_key,
        )
        .await
    }

    pub async fn fetch_collection(
        &self,
        kind: CollectionKind,
        owner_fp: &str,
        signing_public_key: &[u8],
        enc_secret_key: &[u8],
    ) -> dna_records::Result<Collection> {
        dna_records::fetch_collection(self.chunked().as_ref(), kind, owner_fp, signing_public_key, enc_secret_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dna_bootstrap::error::Result as BootstrapResult;
    use dna_bootstrap::{DhtSession, SessionHandle, SessionStatus};
    use dna_chunked::InMemoryChunkedLayer;
    use dna_crypto::sign_keypair;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tempfile::tempdir;

    use crate::config::EngineConfig;

    struct NullSession {
        ready: AtomicBool,
    }

    #[async_trait]
    impl DhtSession for NullSession {
        async fn bootstrap_runtime(&self, _ip: &str, _port: u16) -> BootstrapResult<SessionStatus> {
            Ok(SessionStatus::Ready)
        }
        async fn wait_for_ready(&self, _timeout_ms: u64) -> bool {
            self.ready.load(std::sync::atomic::Ordering::SeqCst)
        }
        async fn get(&self, _key: &str) -> Option<Vec<u8>> {
            None
        }
        async fn put(&self, _key: &str, _value: Vec<u8>, _ttl_secs: u64) -> BootstrapResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn facade_round_trips_a_topic() {
        let dir = tempdir().unwrap();
        let config = EngineConfig {
            base_dir: dir.path().to_path_buf(),
            discovery: Default::default(),
        };
        let session = SessionHandle::owned(Arc::new(NullSession {
            ready: AtomicBool::new(false),
        }));
        let chunked: Arc<dyn dna_chunked::ChunkedLayer> = Arc::new(InMemoryChunkedLayer::new());
        let engine = Engine::new(config, session, chunked).unwrap();

        let kp = sign_keypair();
        let topic = engine
            .create_topic("alice-fp", "Hi", "body", "general", vec![], &kp.secret_key)
            .await
            .unwrap();
        let fetched = engine.get_topic(&topic.topic_uuid, &kp.public_key).await.unwrap();
        assert_eq!(fetched.title, "Hi");
    }
}
