//! Shared application state handed to every handler via `web::Data`.
//! Bundles one instance of each subsystem built in `main.rs`'s bootstrap;
//! every field is internally `Arc`/pool-backed and cheap to clone.

use flit_counters::CounterStore;
use flit_db::Repositories;
use flit_engagement::EngagementEngine;
use flit_feed::FeedAssembler;
use flit_feedstore::FeedStore;
use flit_realtime::SessionHub;

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub engagement: EngagementEngine,
    pub feed: FeedAssembler,
    pub counters: CounterStore,
    pub feed_store: FeedStore,
    pub realtime: SessionHub,
    pub instance_id: String,
}
