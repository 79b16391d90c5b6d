//! Stat extraction / naming engine
//!
//! Walks the broker's cluster/node/vhost/queue/exchange hierarchy and emits
//! one dispatch per numeric leaf, under a flat, collision-resistant metric
//! identity: scope, category, instance, stat name and optional sub-stat.

mod groups;
mod naming;

pub use groups::{MESSAGE_DETAILS, MESSAGE_STATS, NODE_STATS, OVERVIEW_STATS, QUEUE_STATS};
pub use naming::{node_host, normalize_vhost, Namer, DEFAULT_CLUSTER_INSTANCE};

use serde_json::Value;
use tracing::{debug, warn};

use crate::collector::{ManagementClient, StatCategory};
use crate::config::PollConfig;
use crate::dispatch::{Dispatcher, MetricIdentity, MetricSink};
use crate::error::ClientError;

/// Category label for node metrics
const NODE_PLUGIN: &str = "node";
/// Category label for cluster overview metrics
const OVERVIEW_PLUGIN: &str = "overview";

/// Numeric leaf with the missing-key policy applied: absent, null or
/// non-numeric values count as 0.
fn num_or_zero(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

/// One poll/extract/dispatch pipeline for a single broker
///
/// Holds no mutable state across cycles; the dispatcher is passed explicitly
/// through the poll entry point.
pub struct StatsEngine {
    client: ManagementClient,
    namer: Namer,
}

impl StatsEngine {
    /// Build the engine for one broker
    ///
    /// # Errors
    /// Returns an error if the HTTP client fails to build
    pub fn new(config: &PollConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: ManagementClient::new(config)?,
            namer: Namer::new(config.prefix.clone(), config.vhost_prefix.clone()),
        })
    }

    /// Borrow the underlying management API client
    pub fn client(&self) -> &ManagementClient {
        &self.client
    }

    /// Run one full poll cycle
    ///
    /// Nodes first, then the cluster overview, then queues and exchanges per
    /// vhost, sequentially. Every external failure is isolated at its
    /// boundary, so a cycle always runs to completion.
    pub async fn read<S: MetricSink>(&self, dispatcher: &mut Dispatcher<S>) {
        self.dispatch_nodes(dispatcher).await;
        self.dispatch_overview(dispatcher).await;
        for vhost in self.client.vhost_names().await {
            self.dispatch_queues(&vhost, dispatcher).await;
            self.dispatch_exchanges(&vhost, dispatcher).await;
        }
    }

    /// Fetch and dispatch per-node stats
    async fn dispatch_nodes<S: MetricSink>(&self, dispatcher: &mut Dispatcher<S>) {
        let mut seen = Vec::new();
        for node in self.client.nodes().await {
            let Some(raw_name) = node.get("name").and_then(Value::as_str) else {
                warn!("Node entry without a name, skipping");
                continue;
            };

            let mut instance = node_host(raw_name).to_string();
            // Two nodes can resolve to the same host segment after the `@`
            // split; suffix with the running count so neither series
            // silently overwrites the other within this cycle.
            if seen.contains(&instance) {
                instance = format!("{}{}", instance, seen.len());
            }
            seen.push(instance.clone());

            self.dispatch_node_stats(&node, &instance, dispatcher);
        }
    }

    /// Dispatch the fixed node gauge list for one node
    fn dispatch_node_stats<S: MetricSink>(
        &self,
        node: &Value,
        instance: &str,
        dispatcher: &mut Dispatcher<S>,
    ) {
        let scope = self.namer.vhost_scope(None);
        debug!(node = %instance, "Dispatching node stats");

        for stat in NODE_STATS {
            dispatcher.dispatch(
                num_or_zero(node.get(stat)),
                MetricIdentity::new(
                    scope.clone(),
                    NODE_PLUGIN,
                    Some(instance.to_string()),
                    stat,
                    None,
                ),
            );

            let details_key = format!("{}_details", stat);
            let Some(details) = node.get(details_key.as_str()).filter(|v| v.is_object()) else {
                continue;
            };
            dispatcher.dispatch(
                num_or_zero(details.get("rate")),
                MetricIdentity::new(
                    scope.clone(),
                    NODE_PLUGIN,
                    Some(instance.to_string()),
                    details_key.clone(),
                    Some("rate".to_string()),
                ),
            );
        }
    }

    /// Fetch and dispatch the cluster overview subtrees
    async fn dispatch_overview<S: MetricSink>(&self, dispatcher: &mut Dispatcher<S>) {
        let Some(overview) = self.client.overview().await else {
            debug!("No overview data this cycle");
            return;
        };
        self.dispatch_overview_stats(&overview, dispatcher);
    }

    /// Dispatch the fixed overview subtree stats
    ///
    /// Stat names are prefixed with the subtree name so the flat namespace
    /// stays collision-resistant across subtrees.
    fn dispatch_overview_stats<S: MetricSink>(
        &self,
        overview: &Value,
        dispatcher: &mut Dispatcher<S>,
    ) {
        let scope = self.namer.vhost_scope(None);
        let instance = self
            .namer
            .cluster_instance(overview.get("cluster_name").and_then(Value::as_str));

        debug!(cluster = %instance, "Dispatching overview stats");

        for (subtree_name, stats) in OVERVIEW_STATS {
            let subtree = overview.get(subtree_name);
            for &stat in stats {
                let type_name = format!("{}_{}", subtree_name, stat);
                dispatcher.dispatch(
                    num_or_zero(subtree.and_then(|s| s.get(stat))),
                    MetricIdentity::new(
                        scope.clone(),
                        OVERVIEW_PLUGIN,
                        Some(instance.clone()),
                        type_name.clone(),
                        None,
                    ),
                );

                let details_key = format!("{}_details", stat);
                let Some(details) = subtree
                    .and_then(|s| s.get(details_key.as_str()))
                    .filter(|v| v.is_object())
                else {
                    continue;
                };
                dispatcher.dispatch(
                    num_or_zero(details.get("rate")),
                    MetricIdentity::new(
                        scope.clone(),
                        OVERVIEW_PLUGIN,
                        Some(instance.clone()),
                        format!("{}_details", type_name),
                        Some("rate".to_string()),
                    ),
                );
            }
        }
    }

    /// Fetch and dispatch queue stats for one vhost
    async fn dispatch_queues<S: MetricSink>(&self, vhost: &str, dispatcher: &mut Dispatcher<S>) {
        debug!(vhost = %vhost, "Dispatching queue stats");
        let stats = self
            .client
            .stats_for(StatCategory::Queue, None, Some(vhost))
            .await;
        for (queue_name, data) in &stats {
            self.dispatch_message_stats(
                data,
                vhost,
                StatCategory::Queue.plural(),
                queue_name,
                dispatcher,
            );
            self.dispatch_queue_stats(
                data,
                vhost,
                StatCategory::Queue.plural(),
                queue_name,
                dispatcher,
            );
        }
    }

    /// Fetch and dispatch exchange stats for one vhost
    async fn dispatch_exchanges<S: MetricSink>(&self, vhost: &str, dispatcher: &mut Dispatcher<S>) {
        debug!(vhost = %vhost, "Dispatching exchange stats");
        let stats = self
            .client
            .stats_for(StatCategory::Exchange, None, Some(vhost))
            .await;
        for (exchange_name, data) in &stats {
            self.dispatch_message_stats(
                data,
                vhost,
                StatCategory::Exchange.plural(),
                exchange_name,
                dispatcher,
            );
        }
    }

    /// Dispatch the message-rate stat group for one entity
    ///
    /// An entity without `message_stats` has no traffic recorded yet; it
    /// gets no message-rate series at all rather than zeroed placeholders.
    /// Within a present `message_stats`, every enumerated key dispatches
    /// (missing keys as 0), and each present `<stat>_details` sub-object
    /// dispatches its four detail values.
    fn dispatch_message_stats<S: MetricSink>(
        &self,
        data: &Value,
        vhost: &str,
        plugin: &str,
        instance: &str,
        dispatcher: &mut Dispatcher<S>,
    ) {
        let Some(message_stats) = data.get("message_stats").filter(|v| v.is_object()) else {
            debug!(plugin = %plugin, instance = %instance, "No message stats");
            return;
        };

        let scope = self.namer.vhost_scope(Some(vhost));
        for stat in MESSAGE_STATS {
            dispatcher.dispatch(
                num_or_zero(message_stats.get(stat)),
                MetricIdentity::new(
                    scope.clone(),
                    plugin,
                    Some(instance.to_string()),
                    stat,
                    None,
                ),
            );

            let details_key = format!("{}_details", stat);
            let Some(details) = message_stats
                .get(details_key.as_str())
                .filter(|v| v.is_object())
            else {
                continue;
            };
            for detail in MESSAGE_DETAILS {
                dispatcher.dispatch(
                    num_or_zero(details.get(detail)),
                    MetricIdentity::new(
                        scope.clone(),
                        plugin,
                        Some(instance.to_string()),
                        details_key.clone(),
                        Some(detail.to_string()),
                    ),
                );
            }
        }
    }

    /// Dispatch the fixed queue gauge list for one queue
    fn dispatch_queue_stats<S: MetricSink>(
        &self,
        data: &Value,
        vhost: &str,
        plugin: &str,
        instance: &str,
        dispatcher: &mut Dispatcher<S>,
    ) {
        let scope = self.namer.vhost_scope(Some(vhost));
        for stat in QUEUE_STATS {
            dispatcher.dispatch(
                num_or_zero(data.get(stat)),
                MetricIdentity::new(
                    scope.clone(),
                    plugin,
                    Some(instance.to_string()),
                    stat,
                    None,
                ),
            );
        }
    }
}
