//! Run-scoped metric deduplication.

use crate::{Metric, MetricKey};
use contracts_core::DiagnosticsLog;
use contracts_sql::TableRef;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::debug;

/// Aggregation identity without the configuration digest.
type MeasureIdentity = (String, TableRef, Option<String>, String, Option<String>);

/// Maps structural metric keys to one canonical instance per run.
///
/// The first metric registered under a key becomes canonical; later requests
/// for the same key get that instance back and their candidate is dropped.
#[derive(Debug)]
pub struct MetricResolver {
    metrics: HashMap<MetricKey, Arc<Metric>>,
    order: Vec<Arc<Metric>>,
    digests: HashMap<MeasureIdentity, String>,
    log: DiagnosticsLog,
}

impl MetricResolver {
    pub fn new(log: DiagnosticsLog) -> Self {
        Self {
            metrics: HashMap::new(),
            order: Vec::new(),
            digests: HashMap::new(),
            log,
        }
    }

    /// Returns the canonical instance for `metric`'s key.
    pub fn resolve(&mut self, metric: Metric) -> Arc<Metric> {
        if let Some(existing) = self.metrics.get(metric.key()) {
            return Arc::clone(existing);
        }

        self.check_configuration_conflict(metric.key());

        let metric = Arc::new(metric);
        debug!(metric = metric.name(), "Registered metric");
        self.metrics.insert(metric.key().clone(), Arc::clone(&metric));
        self.order.push(Arc::clone(&metric));
        metric
    }

    /// Warns when a measure is requested again with a different configuration.
    fn check_configuration_conflict(&mut self, key: &MetricKey) {
        let MetricKey::Aggregation {
            data_source,
            dataset,
            column,
            metric_type,
            filter,
            config_digest,
        } = key
        else {
            return;
        };

        let identity = (
            data_source.clone(),
            dataset.clone(),
            column.clone(),
            metric_type.clone(),
            filter.clone(),
        );
        match self.digests.entry(identity) {
            Entry::Vacant(entry) => {
                entry.insert(config_digest.clone());
            }
            Entry::Occupied(entry) if entry.get() != config_digest => {
                let target = match column {
                    Some(column) => format!("column '{}'", column),
                    None => format!("dataset '{}'", dataset),
                };
                self.log.warning(
                    format!(
                        "Conflicting configurations for {} on {}, each is computed separately",
                        metric_type, target
                    ),
                    None,
                );
            }
            Entry::Occupied(_) => {}
        }
    }

    /// Canonical metrics in registration order.
    pub fn metrics(&self) -> &[Arc<Metric>] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
