//! The autoscaler's control loop: periodic monitor-decide-act ticks, an
//! hourly metric-store cleanup sweep, cooldowns, dry-run, and a
//! cooperative shutdown path.
//!
//! Modeled as a long-lived struct with `start`/`stop` spawning background
//! tasks behind a shared `Arc<AtomicBool>` running flag: one task drives
//! the main tick loop, a second interval-driven task drives periodic
//! cleanup, and both observe the same cancellation token for a graceful
//! shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::{RwLock, Semaphore};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use reefscale_http::ApiClient;
use reefscale_metrics::MetricStore;
use reefscale_planner::{plan, PlannerError};
use reefscale_rules::{evaluate, Verdict};
use reefscale_topology::{parse_topology, to_patch_payload, ClusterState};

use crate::config::AutoscalerConfig;
use crate::control_plane;
use crate::descriptors::hostnames_from_connection_string;
use crate::last_action::{LastActionMap, ScaleAction};
use crate::status::ScalerStatus;

const CLEANUP_INTERVAL: StdDuration = StdDuration::from_secs(3600);
const RETENTION: chrono::Duration = chrono::Duration::hours(1);
const MEASUREMENT_PERIOD: &str = "PT10M";
const PRIMARY_GRANULARITY: &str = "PT1M";
const FALLBACK_GRANULARITY: &str = "PT10S";
const MAX_PARALLEL_CLUSTERS: usize = 8;
const SHUTDOWN_GRACE: StdDuration = StdDuration::from_secs(30);

struct Inner {
    config: AutoscalerConfig,
    client: ApiClient,
    metrics: MetricStore,
    last_action: LastActionMap,
    running: AtomicBool,
    shutdown: CancellationToken,
    fanout: Arc<Semaphore>,
    status: RwLock<ScalerStatus>,
}

/// The autoscaler daemon. Cheap to clone (an `Arc` around its state) so
/// spawned background tasks can each hold their own handle.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(config: AutoscalerConfig) -> Result<Self, reefscale_http::ControlPlaneError> {
        let client = ApiClient::new(
            config.base_url.clone(),
            reefscale_http::Credentials { public_key: config.api_public_key.clone(), private_key: config.api_private_key.clone() },
        )?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                client,
                metrics: MetricStore::new(),
                last_action: LastActionMap::new(),
                running: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                fanout: Arc::new(Semaphore::new(MAX_PARALLEL_CLUSTERS)),
                status: RwLock::new(ScalerStatus::default()),
            }),
        })
    }

    /// Spawns the tick loop and the hourly cleanup sweep. Idempotent: a
    /// second call while already running is a no-op.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!("scheduler already running; ignoring duplicate start");
            return;
        }

        let tick_scheduler = self.clone();
        tokio::spawn(async move { tick_scheduler.tick_loop().await });

        let cleanup_scheduler = self.clone();
        tokio::spawn(async move { cleanup_scheduler.cleanup_loop().await });

        info!("autoscaler scheduler started");
    }

    /// Flips the running flag, cancels the shared token, and waits up to
    /// 30 seconds for in-flight work to observe it before returning. The
    /// current tick completes; remaining tasks are cancelled.
    pub async fn stop(&self) {
        info!("stopping autoscaler scheduler");
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.shutdown.cancel();
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    }

    pub async fn status(&self) -> ScalerStatus {
        self.inner.status.read().await.clone()
    }

    async fn tick_loop(&self) {
        let mut ticker = interval(self.inner.config.monitoring_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.inner.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.inner.shutdown.cancelled() => break,
            }

            if !self.inner.running.load(Ordering::SeqCst) {
                break;
            }

            match timeout(self.inner.config.monitoring_interval, self.tick()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(error = %err, "tick failed"),
                Err(_) => warn!("tick exceeded the monitoring interval; skipping to the next one"),
            }

            let mut status = self.inner.status.write().await;
            status.running = self.inner.running.load(Ordering::SeqCst);
            status.clusters_monitored = self.inner.metrics.cluster_count() as u64;
            status.recent_scale_actions = self.inner.last_action.recent(20);
            status.last_update = Some(Utc::now());
        }

        info!("tick loop stopped");
    }

    async fn cleanup_loop(&self) {
        let mut ticker = interval(CLEANUP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.inner.shutdown.cancelled() => break,
            }
            if !self.inner.running.load(Ordering::SeqCst) {
                break;
            }
            let cutoff = Utc::now() - RETENTION;
            self.inner.metrics.evict_older_than(cutoff);
            debug!(%cutoff, "evicted metric points older than the retention window");
        }
    }

    /// One full monitor-decide-act pass across every configured project.
    async fn tick(&self) -> anyhow::Result<()> {
        let cancel = self.inner.shutdown.clone();
        let all_projects = control_plane::list_projects(&self.inner.client, &cancel).await?;
        let project_names: std::collections::HashSet<&str> = self.inner.config.project_names.iter().map(String::as_str).collect();
        let projects: Vec<_> = all_projects.into_iter().filter(|p| project_names.contains(p.name.as_str())).collect();

        for project in projects {
            if !self.inner.running.load(Ordering::SeqCst) {
                break;
            }

            let clusters = match control_plane::list_clusters(&self.inner.client, &project.id, &cancel).await {
                Ok(c) => c,
                Err(err) => {
                    warn!(project = %project.name, error = %err, "skipping project: failed to list clusters");
                    continue;
                }
            };

            let mut handles = Vec::new();
            for cluster in clusters {
                if !self.inner.running.load(Ordering::SeqCst) {
                    break;
                }
                let scheduler = self.clone();
                let project_id = project.id.clone();
                let project_name = project.name.clone();
                let permit = match Arc::clone(&self.inner.fanout).acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    scheduler.process_cluster(&project_name, &project_id, cluster).await
                }));
            }

            for handle in handles {
                if let Ok(Err(err)) = handle.await {
                    warn!(project = %project.name, error = %err, "error while processing a cluster");
                }
            }
        }

        Ok(())
    }

    async fn process_cluster(
        &self,
        project_name: &str,
        project_id: &str,
        cluster: reefscale_topology::ClusterDescriptionDto,
    ) -> anyhow::Result<()> {
        let cancel = self.inner.shutdown.clone();
        let state = ClusterState::parse(&cluster.state_name);
        if !state.is_idle() {
            debug!(cluster = %cluster.name, state = ?state, "skipping cluster: not IDLE");
            return Ok(());
        }

        let cluster_key = format!("{project_name}/{}", cluster.name);

        let standard = match cluster.connection_strings.as_ref().and_then(|c| c.standard.clone()) {
            Some(s) => s,
            None => {
                warn!(cluster = %cluster.name, "skipping cluster: no standard connection string");
                return Ok(());
            }
        };
        let cluster_hosts = hostnames_from_connection_string(&standard);

        let all_processes = control_plane::list_processes(&self.inner.client, project_id, &cancel).await?;
        let cluster_processes: Vec<_> = all_processes
            .into_iter()
            .filter(|p| cluster_hosts.iter().any(|h| h == &p.user_alias) && p.is_data_bearing())
            .collect();

        let metric_names: Vec<String> =
            self.inner.config.rules.iter().map(|r| r.metric_name.clone()).collect::<std::collections::BTreeSet<_>>().into_iter().collect();

        if !metric_names.is_empty() {
            for process in &cluster_processes {
                self.ingest_process_metrics(&cluster_key, project_id, process, &metric_names, &cancel).await;
            }
        }

        let topology = match parse_topology(&cluster) {
            Ok(t) => t,
            Err(err) => {
                warn!(cluster = %cluster.name, error = %err, "skipping cluster: failed to parse topology");
                return Ok(());
            }
        };

        let now = Utc::now();
        for rule in &self.inner.config.rules {
            if let Some(last) = self.inner.last_action.last(&cluster_key) {
                let remaining = rule.cooldown - (now - last.at_time);
                if remaining > chrono::Duration::zero() {
                    warn!(
                        cluster = %cluster.name,
                        rule = %rule.name,
                        remaining_secs = remaining.num_seconds(),
                        "skipping rule: cluster still in cooldown"
                    );
                    continue;
                }
            }

            if evaluate(&self.inner.metrics, &cluster_key, rule, now) == Verdict::NoTrigger {
                continue;
            }

            let planned = match plan(&topology, rule, self.inner.config.scale_all_shards_in_unison, self.inner.config.allow_per_shard_scaling) {
                Ok(Some(p)) => p,
                Ok(None) => {
                    info!(cluster = %cluster.name, rule = %rule.name, "rule triggered but target is already at a ladder boundary; no-op");
                    break;
                }
                Err(PlannerError::ShardCountMismatch { current, projected }) => {
                    error!(cluster = %cluster.name, rule = %rule.name, current, projected, "planner validation failed: shard count mismatch");
                    break;
                }
                Err(PlannerError::OffLadderTier { shard_id }) => {
                    error!(cluster = %cluster.name, rule = %rule.name, shard_id, "planner validation failed: off-ladder tier");
                    break;
                }
            };

            if self.inner.config.dry_run {
                for change in &planned.role_changes {
                    info!(
                        cluster = %cluster.name,
                        shard = %change.shard_id,
                        role = ?change.role,
                        from = %change.from,
                        to = %change.to,
                        "dry-run: would scale"
                    );
                }
                break;
            }

            match self.commit(project_id, &cluster.name, &cluster_key, rule, &planned.target, &cancel).await {
                Ok(()) => info!(cluster = %cluster.name, rule = %rule.name, "committed scaling action"),
                Err(err) => warn!(cluster = %cluster.name, rule = %rule.name, error = %err, "scaling action suppressed"),
            }
            break;
        }

        Ok(())
    }

    async fn ingest_process_metrics(
        &self,
        cluster_key: &str,
        project_id: &str,
        process: &crate::descriptors::ProcessDescriptor,
        metric_names: &[String],
        cancel: &CancellationToken,
    ) {
        let fetch = |granularity: &'static str| {
            control_plane::fetch_measurements(
                &self.inner.client,
                project_id,
                &process.hostname,
                process.port,
                metric_names,
                granularity,
                MEASUREMENT_PERIOD,
                cancel,
            )
        };

        let series = match fetch(PRIMARY_GRANULARITY).await {
            Ok(series) if series.iter().all(|(_, points)| points.is_empty()) => match fetch(FALLBACK_GRANULARITY).await {
                Ok(series) => series,
                Err(err) => {
                    warn!(host = %process.hostname, error = %err, "failed to fetch fallback-granularity measurements");
                    return;
                }
            },
            Ok(series) => series,
            Err(err) => {
                warn!(host = %process.hostname, error = %err, "failed to fetch measurements");
                return;
            }
        };

        for (metric_name, points) in series {
            for point in points {
                self.inner.metrics.ingest(&cluster_key.to_string(), &metric_name, &point.hostname, point.timestamp, point.value);
            }
        }
    }

    /// Re-verifies the cluster is still IDLE immediately before committing
    /// (the cluster must not currently be in a scaling state), then issues
    /// the PATCH and records the action.
    async fn commit(
        &self,
        project_id: &str,
        cluster_name: &str,
        cluster_key: &str,
        rule: &reefscale_rules::ScalingRule,
        target: &reefscale_topology::ClusterTopology,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let fresh = control_plane::get_cluster(&self.inner.client, project_id, cluster_name, cancel).await?;
        if !ClusterState::parse(&fresh.state_name).is_idle() {
            anyhow::bail!("cluster entered a non-IDLE state before commit; action suppressed");
        }

        let payload = to_patch_payload(target);
        control_plane::update_cluster_topology(&self.inner.client, project_id, cluster_name, &payload, cancel).await?;

        self.inner.last_action.record(ScaleAction { cluster_key: cluster_key.to_string(), rule_name: rule.name.clone(), at_time: Utc::now() });
        Ok(())
    }
}
