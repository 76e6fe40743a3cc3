//! HTTP edge and process bootstrap for the timeline delivery platform
//! (spec §6). Wires every subsystem crate together and runs the HTTP
//! server alongside the queue consumers, the cross-instance bus relay,
//! the idle-session sweeper, a counter-reconciliation housekeeper, and
//! an idempotency-key cleanup housekeeper — all under one graceful
//! shutdown, grounded on
//! `content-service/src/main.rs`'s `JoinSet<io::Result<()>>` +
//! `tokio::select!` shutdown loop.

mod auth;
mod handlers;
mod health;
mod metrics;
mod rate_limit;
mod state;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use flit_core::config::{thresholds, Config};
use flit_core::domain::CounterMetric;
use flit_counters::CounterStore;
use flit_db::{create_pool, migrate, DbConfig, OutboxRepository, Repositories};
use flit_engagement::EngagementEngine;
use flit_fanout::FanoutWorker;
use flit_feed::FeedAssembler;
use flit_feedstore::{CelebrityRegistry, DistributedLock, FeedStore};
use flit_queue::{idempotency::HandledIds, names, ConsumerHealth, Queue};
use flit_realtime::SessionHub;
use redis::aio::ConnectionManager;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;

use crate::auth::BearerAuth;
use crate::health::HealthState;
use crate::metrics::RequestMetrics;
use crate::rate_limit::PerIpRateLimit;
use crate::state::AppState;

const FANOUT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const NOTIFY_POLL_INTERVAL: Duration = Duration::from_millis(200);
const FANOUT_BATCH_SIZE: i64 = 50;
const NOTIFY_BATCH_SIZE: i64 = 50;
const HANDLED_IDS_CAPACITY: usize = 10_000;
const COUNTER_RECONCILE_INTERVAL_SECS: u64 = 300;
const COUNTER_RECONCILE_SAMPLE: i64 = 500;
const IDEMPOTENCY_CLEANUP_INTERVAL_SECS: u64 = 3_600;
const IDEMPOTENCY_RETENTION_SECS: i64 = 7 * 24 * 3_600;

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    flit_core::logging::init("flit-api");

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    tracing::info!(instance_id = %config.instance_id, "starting flit-api");

    let db_pool = create_pool(DbConfig {
        database_url: config.database_url.clone(),
        max_connections: config.db_max_connections,
        ..Default::default()
    })
    .await
    .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("database pool: {e}")))?;

    migrate(&db_pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("migrations: {e}")))?;

    let redis_client = redis::Client::open(config.redis_addr.clone())
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("redis client: {e}")))?;
    let redis_conn = ConnectionManager::new(redis_client.clone())
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("redis connection: {e}")))?;

    let repos = Repositories::new(db_pool.clone());
    let outbox = OutboxRepository::new(db_pool.clone());

    let fanout_high = Queue::new(outbox.clone(), names::FANOUT_HIGH);
    let fanout_normal = Queue::new(outbox.clone(), names::FANOUT_NORMAL);
    let notify_queue = Queue::new(outbox.clone(), names::NOTIFY_REALTIME);
    let index_queue = Queue::new(outbox.clone(), names::SEARCH_INDEX);

    let feed_store = FeedStore::new(redis_conn.clone());
    let celebrities = CelebrityRegistry::new(redis_conn.clone());
    let lock = DistributedLock::new(redis_conn.clone());
    let counters = CounterStore::new(redis_conn.clone(), repos.posts.clone());

    let feed = FeedAssembler::new(
        feed_store.clone(),
        repos.posts.clone(),
        repos.follows.clone(),
        celebrities.clone(),
        lock,
    );

    let realtime = SessionHub::new();

    let bus_publisher = flit_bus::BusPublisher::new(redis_conn.clone());
    let bus_subscription = flit_bus::subscribe_channel::<flit_realtime::BusEnvelope>(
        redis_client.clone(),
        flit_realtime::GLOBAL_CHANNEL.to_string(),
        flit_bus::DEFAULT_BUFFER,
    )
    .await
    .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("bus subscription: {e}")))?;

    let engagement = EngagementEngine::new(
        repos.posts.clone(),
        repos.follows.clone(),
        repos.likes.clone(),
        repos.retweets.clone(),
        repos.users.clone(),
        repos.notifications.clone(),
        counters.clone(),
        feed_store.clone(),
        fanout_high.clone(),
        fanout_normal.clone(),
        notify_queue.clone(),
        index_queue.clone(),
        bus_publisher.clone(),
    );

    let app_state = web::Data::new(AppState {
        repos: repos.clone(),
        engagement,
        feed,
        counters: counters.clone(),
        feed_store: feed_store.clone(),
        realtime: realtime.clone(),
        instance_id: config.instance_id.clone(),
    });

    let health_state = web::Data::new(HealthState {
        db_pool: db_pool.clone(),
        redis: Mutex::new(redis_conn.clone()),
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: JoinSet<io::Result<()>> = JoinSet::new();

    let rate_limit = PerIpRateLimit::new(50, 100);

    let bind_addr = format!("{}:{}", config.addr, config.port);
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .app_data(health_state.clone())
            .wrap(cors)
            .wrap(RequestMetrics)
            .wrap(rate_limit.clone())
            .route("/health", web::get().to(health::health))
            .route("/healthz", web::get().to(health::health))
            .route("/readyz", web::get().to(health::ready))
            .route("/livez", web::get().to(health::live))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .service(
                web::scope("/api/v1")
                    .service(
                        web::scope("/posts")
                            .wrap(BearerAuth)
                            .route("", web::post().to(handlers::posts::create_post))
                            .route("/batch", web::post().to(handlers::posts::batch))
                            .route("/{id}", web::get().to(handlers::posts::get_post))
                            .route("/{id}", web::delete().to(handlers::posts::delete_post))
                            .route("/{id}/like", web::post().to(handlers::posts::like))
                            .route("/{id}/like", web::delete().to(handlers::posts::unlike))
                            .route("/{id}/retweet", web::post().to(handlers::posts::retweet))
                            .route("/{id}/retweet", web::delete().to(handlers::posts::unretweet))
                            .route("/{id}/replies", web::get().to(handlers::posts::replies)),
                    )
                    .service(
                        web::scope("/users")
                            .wrap(BearerAuth)
                            .route("/{id}/posts", web::get().to(handlers::posts::user_posts))
                            .route("/{id}/follow", web::post().to(handlers::follows::follow))
                            .route("/{id}/follow", web::delete().to(handlers::follows::unfollow))
                            .route("/{id}/follower-ids", web::get().to(handlers::timeline::follower_ids)),
                    )
                    .service(
                        web::scope("/timeline")
                            .wrap(BearerAuth)
                            .route("/home", web::get().to(handlers::timeline::home))
                            .route("/user/{id}", web::get().to(handlers::timeline::user_timeline))
                            .route("/add", web::post().to(handlers::timeline::add)),
                    )
                    .service(
                        web::scope("/notifications")
                            .wrap(BearerAuth)
                            .route("", web::get().to(handlers::notifications::list))
                            .route("/{id}/read", web::post().to(handlers::notifications::mark_read)),
                    )
                    .service(
                        web::scope("/realtime")
                            .wrap(BearerAuth)
                            .route("/stream", web::get().to(handlers::realtime::stream)),
                    ),
            )
    })
    .bind(&bind_addr)?
    .workers(4)
    .run();

    let server_handle = server.handle();
    tasks.spawn(async move {
        tracing::info!("HTTP server running");
        server.await
    });

    {
        let worker = Arc::new(FanoutWorker {
            follows: repos.follows.clone(),
            feed_store: feed_store.clone(),
            celebrities: celebrities.clone(),
            index_queue: index_queue.clone(),
            notify_queue: notify_queue.clone(),
            concurrency: thresholds::DEFAULT_FANOUT_CONCURRENCY,
        });
        let posts_for_content = repos.posts.clone();
        let queue = fanout_high.clone();
        let health = Arc::new(ConsumerHealth::default());
        let handled = Arc::new(HandledIds::new(HANDLED_IDS_CAPACITY, repos.idempotency.clone()));
        let shutdown_rx = shutdown_rx.clone();
        tasks.spawn(async move {
            flit_queue::run_consumer(
                queue,
                health,
                handled,
                FANOUT_BATCH_SIZE,
                FANOUT_POLL_INTERVAL,
                shutdown_rx,
                move |item| {
                    let worker = worker.clone();
                    let posts = posts_for_content.clone();
                    async move { handle_fanout_item(&worker, &posts, item).await }
                },
            )
            .await;
            Ok(())
        });
    }

    {
        let worker = Arc::new(FanoutWorker {
            follows: repos.follows.clone(),
            feed_store: feed_store.clone(),
            celebrities: celebrities.clone(),
            index_queue: index_queue.clone(),
            notify_queue: notify_queue.clone(),
            concurrency: thresholds::DEFAULT_FANOUT_CONCURRENCY,
        });
        let posts_for_content = repos.posts.clone();
        let queue = fanout_normal.clone();
        let health = Arc::new(ConsumerHealth::default());
        let handled = Arc::new(HandledIds::new(HANDLED_IDS_CAPACITY, repos.idempotency.clone()));
        let shutdown_rx = shutdown_rx.clone();
        tasks.spawn(async move {
            flit_queue::run_consumer(
                queue,
                health,
                handled,
                FANOUT_BATCH_SIZE,
                FANOUT_POLL_INTERVAL,
                shutdown_rx,
                move |item| {
                    let worker = worker.clone();
                    let posts = posts_for_content.clone();
                    async move { handle_fanout_item(&worker, &posts, item).await }
                },
            )
            .await;
            Ok(())
        });
    }

    {
        let queue = flit_realtime::notify_realtime_queue(outbox.clone());
        let notifications = repos.notifications.clone();
        let bus = bus_publisher.clone();
        let health = Arc::new(ConsumerHealth::default());
        let handled = Arc::new(HandledIds::new(HANDLED_IDS_CAPACITY, repos.idempotency.clone()));
        let shutdown_rx = shutdown_rx.clone();
        tasks.spawn(async move {
            flit_queue::run_consumer(
                queue,
                health,
                handled,
                NOTIFY_BATCH_SIZE,
                NOTIFY_POLL_INTERVAL,
                shutdown_rx,
                move |item| {
                    let notifications = notifications.clone();
                    let bus = bus.clone();
                    async move { flit_realtime::handle_notify_item(&notifications, &bus, item.payload).await }
                },
            )
            .await;
            Ok(())
        });
    }

    {
        let hub = realtime.clone();
        let rx = bus_subscription.subscribe();
        let drops = bus_subscription.drops.clone();
        tasks.spawn(async move {
            flit_realtime::run_global_relay(hub, rx, drops).await;
            Ok(())
        });
    }

    {
        let hub = realtime.clone();
        let shutdown_rx = shutdown_rx.clone();
        tasks.spawn(async move {
            flit_realtime::run_sweeper(hub, shutdown_rx).await;
            Ok(())
        });
    }

    {
        let posts = repos.posts.clone();
        let counters = counters.clone();
        let mut shutdown_rx = shutdown_rx.clone();
        tasks.spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(COUNTER_RECONCILE_INTERVAL_SECS));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match posts.recent_published_ids(COUNTER_RECONCILE_SAMPLE).await {
                            Ok(ids) => {
                                for metric in [CounterMetric::Likes, CounterMetric::Retweets, CounterMetric::Replies] {
                                    if let Err(err) = counters.reconcile(&ids, metric).await {
                                        tracing::warn!(error = %err, "counter reconciliation pass failed");
                                    }
                                }
                            }
                            Err(err) => tracing::warn!(error = %err, "failed to sample recent posts for reconciliation"),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            Ok(())
        });
    }

    {
        let idempotency = repos.idempotency.clone();
        let mut shutdown_rx = shutdown_rx.clone();
        tasks.spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(IDEMPOTENCY_CLEANUP_INTERVAL_SECS));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match idempotency.cleanup_older_than(IDEMPOTENCY_RETENTION_SECS).await {
                            Ok(deleted) if deleted > 0 => tracing::info!(deleted, "cleaned up expired idempotency keys"),
                            Ok(_) => {}
                            Err(err) => tracing::warn!(error = %err, "idempotency key cleanup failed"),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            Ok(())
        });
    }

    let mut first_error: Option<io::Error> = None;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = tasks.join_next() => {
                match result {
                    Some(Ok(Ok(()))) => tracing::info!("background task completed"),
                    Some(Ok(Err(e))) => {
                        tracing::error!(error = %e, "background task returned error");
                        if first_error.is_none() { first_error = Some(e); }
                        let _ = shutdown_tx.send(true);
                        server_handle.stop(true).await;
                        tasks.shutdown().await;
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "background task join error");
                        if first_error.is_none() { first_error = Some(io::Error::new(io::ErrorKind::Other, e.to_string())); }
                        let _ = shutdown_tx.send(true);
                        server_handle.stop(true).await;
                        tasks.shutdown().await;
                        break;
                    }
                    None => break,
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
                server_handle.stop(true).await;
                tasks.shutdown().await;
                break;
            }
        }
    }

    tracing::info!("flit-api shutting down");
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn handle_fanout_item(
    worker: &FanoutWorker,
    posts: &flit_db::PostRepository,
    item: flit_core::domain::WorkItem,
) -> flit_core::error::Result<()> {
    match item.payload {
        flit_core::domain::WorkPayload::Fanout { post_id, author_id, follower_count_hint, score } => {
            let content_for_index = posts.find_by_id(post_id).await?.map(|p| p.content);
            worker
                .handle_fanout(post_id, author_id, follower_count_hint, score, content_for_index)
                .await
        }
        flit_core::domain::WorkPayload::Tombstone { post_id, author_id } => {
            worker.handle_tombstone(post_id, author_id).await
        }
        _ => Err(flit_core::error::FlitError::Permanent(
            "fan-out consumer received an unsupported payload kind".to_string(),
        )),
    }
}
